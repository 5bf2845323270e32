//! # PantryVision Core
//!
//! Everything behind the recipe agent's prompt, with no terminal I/O.
//!
//! ## Core Concepts
//! - **Profile**: the local user's likes, dislikes, allergies, restrictions and goals
//! - **Stores**: atomic JSON persistence for the profile and the request history
//! - **Interpreter**: utterance + profile → structured [`RecipeRequest`]
//! - **Generator**: one provider call per request, parsed into a [`Recipe`]
//! - **Provider**: trait-based LLM communication (OpenAI-compatible)

pub mod config;
pub mod error;
pub mod generator;
pub mod history;
pub mod interpreter;
pub mod matcher;
pub mod parse;
pub mod profile;
pub mod provider;
pub mod recipe;
pub mod store;

pub use config::AgentConfig;
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use generator::{CallOutcome, CallState, GenerationOptions, RecipeGenerator};
pub use history::{HistoryEntry, HistoryStats, HistoryStore, Outcome};
pub use interpreter::{interpret, interpret_at, RecipeRequest};
pub use matcher::RecipeType;
pub use profile::{parse_list, Profile, ProfileBuilder};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
    OpenAIProvider, ProviderConfig, ProviderError, ProviderType, Role, Usage, UsageTracker,
};
pub use recipe::{Ingredient, Nutrition, Recipe, Source};
pub use store::{FileBackend, MemoryBackend, ProfileState, ProfileStore, StoreBackend};
