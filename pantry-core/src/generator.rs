//! # Recipe Generation Client
//!
//! One [`RecipeRequest`] in, one provider call, one [`Recipe`] (or error) out.
//!
//! ```text
//! Idle ──generate()──▶ Sent ──┬─▶ Parsed
//!                             ├─▶ MalformedResponse
//!                             ├─▶ TransportError
//!                             └─▶ ProviderRejected
//!                       (back to Idle once the outcome is recorded)
//! ```
//!
//! There are no automatic retries. Transport failures come back as temporary
//! errors so the caller can tell the user to try again.

use crate::config::AgentConfig;
use crate::error::{self, Error, ErrorKind, Result};
use crate::interpreter::RecipeRequest;
use crate::parse::parse_recipe;
use crate::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider, UsageTracker};
use crate::recipe::Recipe;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are PantryVision, a helpful AI assistant that recommends recipes \
based on user preferences, fitness goals, allergies and dietary restrictions. Always provide \
practical, delicious recipes with clear instructions. Never use an ingredient the user is \
allergic to.";

/// Per-call knobs
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_output_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: crate::config::DEFAULT_MAX_TOKENS,
            temperature: crate::config::DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GenerationOptions {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_output_tokens: config.max_tokens(),
            temperature: config.temperature(),
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Sent,
}

/// How the most recent call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Parsed,
    MalformedResponse,
    TransportError,
    /// Permanent refusal by the service (bad credential, unknown model)
    ProviderRejected,
}

impl CallOutcome {
    fn from_error(err: &Error) -> Self {
        if err.is_transport() {
            CallOutcome::TransportError
        } else if err.kind() == ErrorKind::MalformedResponse {
            CallOutcome::MalformedResponse
        } else {
            CallOutcome::ProviderRejected
        }
    }
}

#[derive(Debug)]
struct Tracker {
    state: CallState,
    last_outcome: Option<CallOutcome>,
    usage: UsageTracker,
}

/// Resets the state to `Idle` even if the call future is dropped mid-flight
struct SentGuard<'a> {
    tracker: &'a Mutex<Tracker>,
}

impl Drop for SentGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut t) = self.tracker.lock() {
            t.state = CallState::Idle;
        }
    }
}

pub struct RecipeGenerator<P: LlmProvider> {
    provider: P,
    tracker: Mutex<Tracker>,
}

impl<P: LlmProvider> RecipeGenerator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            tracker: Mutex::new(Tracker {
                state: CallState::Idle,
                last_outcome: None,
                usage: UsageTracker::new(),
            }),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn state(&self) -> CallState {
        self.tracker.lock().map(|t| t.state).unwrap_or(CallState::Idle)
    }

    pub fn last_outcome(&self) -> Option<CallOutcome> {
        self.tracker.lock().ok().and_then(|t| t.last_outcome)
    }

    pub fn usage(&self) -> UsageTracker {
        self.tracker.lock().map(|t| t.usage.clone()).unwrap_or_default()
    }

    fn begin(&self) -> Result<SentGuard<'_>> {
        let mut t = self.tracker.lock().map_err(|_| error::lock_poisoned("generator"))?;
        t.state = CallState::Sent;
        Ok(SentGuard { tracker: &self.tracker })
    }

    fn finish(&self, outcome: CallOutcome) {
        if let Ok(mut t) = self.tracker.lock() {
            t.last_outcome = Some(outcome);
        }
    }

    /// Generate one recipe. Calls the provider exactly once.
    pub async fn generate(
        &self,
        request: &RecipeRequest,
        model: &str,
        options: &GenerationOptions,
    ) -> Result<Recipe> {
        let completion = CompletionRequest::new(compose_messages(request))
            .with_model(model)
            .with_max_tokens(options.max_output_tokens)
            .with_temperature(options.temperature);

        let _guard = self.begin()?;
        debug!(model, provider = self.provider.name(), "sending recipe request");
        let started = Instant::now();

        let result = self.call(completion, model, options.timeout).await;

        let outcome = match &result {
            Ok(_) => CallOutcome::Parsed,
            Err(e) => CallOutcome::from_error(e),
        };
        self.finish(outcome);
        debug!(?outcome, elapsed_ms = started.elapsed().as_millis() as u64, "recipe request finished");

        result.map_err(|e| {
            e.with_operation("generator::generate")
                .with_context("model", model.to_string())
        })
    }

    async fn call(&self, completion: CompletionRequest, model: &str, timeout: Duration) -> Result<Recipe> {
        let response = match tokio::time::timeout(timeout, self.provider.complete(completion)).await {
            Err(_) => return Err(Error::timeout(timeout.as_millis())),
            Ok(Err(e)) => return Err(e.into_error()),
            Ok(Ok(response)) => response,
        };

        if let Ok(mut t) = self.tracker.lock() {
            t.usage.track(model, &response.usage);
        }

        if response.finish_reason == FinishReason::ContentFilter {
            warn!("response was blocked by the provider's content filter");
            return Err(Error::new(
                ErrorKind::ProviderRejected,
                "the reply was blocked by the provider's content filter",
            )
            .with_context("finish_reason", "content_filter"));
        }

        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::malformed_response("response had no content"))?;

        parse_recipe(&content).map_err(|e| {
            if response.finish_reason == FinishReason::Length {
                warn!("response was cut off at the token limit");
                e.with_context("finish_reason", "length")
            } else {
                e
            }
        })
    }
}

/// Build the system and user messages for a request
pub fn compose_messages(request: &RecipeRequest) -> Vec<ChatMessage> {
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(compose_prompt(request))]
}

fn list_or(items: &[String], none: &str) -> String {
    if items.is_empty() {
        none.to_string()
    } else {
        items.join(", ")
    }
}

pub fn compose_prompt(request: &RecipeRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Please recommend one recipe for this request: \"{}\"\n\n",
        request.utterance()
    ));

    prompt.push_str("Request details:\n");
    prompt.push_str(&format!("- Recipe type: {}\n", request.recipe_type()));
    prompt.push_str(&format!("- Tags: {}\n", list_or(request.tags(), "none")));
    prompt.push_str(&format!(
        "- Allergies (MUST NOT contain): {}\n",
        list_or(request.exclusions(), "none")
    ));
    prompt.push_str(&format!("- Dislikes (avoid if possible): {}\n", list_or(request.avoid(), "none")));
    prompt.push_str(&format!(
        "- Dietary restrictions: {}\n",
        list_or(request.dietary_restrictions(), "none")
    ));
    prompt.push_str(&format!(
        "- Relevant preferences: {}\n",
        list_or(request.preferences(), "none")
    ));
    prompt.push_str(&format!(
        "- Relevant fitness goals: {}\n",
        list_or(request.fitness_goals(), "none")
    ));
    if !request.allergen_mentions().is_empty() {
        prompt.push_str(&format!(
            "- The request names {} but the user is allergic: substitute a safe alternative\n",
            request.allergen_mentions().join(", ")
        ));
    }

    prompt.push_str(
        r#"
Respond with a single JSON object and nothing else:
{
  "title": "Recipe name",
  "description": "One or two sentences",
  "ingredients": ["1 lb chicken breast", "2 tbsp olive oil", "1 onion, diced"],
  "instructions": ["Heat oil in a large pan", "Season the chicken", "Cook for 6-8 minutes per side"],
  "prep_time": "15 minutes",
  "cook_time": "25 minutes",
  "nutrition": {"calories": 350, "protein": 28, "carbs": 12, "fat": 18, "fiber": 3, "estimated": true},
  "why_recommended": "Why this fits the user (only relevant preferences and goals)"
}

Requirements:
- Include 8-12 ingredients with quantities and 4-6 clear steps
- Always give prep and cook times in minutes
- Only apply preferences that make sense for the recipe type
- Never include an allergen listed above
"#,
    );
    prompt
}
