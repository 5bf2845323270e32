//! # PantryVision Agent
//!
//! The interactive side of the recipe assistant:
//! 1. First run asks five profile questions and saves the answers
//! 2. Each line is either a command or a recipe request
//! 3. A request is interpreted against the profile and sent to the model once
//! 4. The recipe is shown and recorded in the history
//!
//! Input and output are abstract ([`InputSource`], `std::io::Write`) so the
//! whole loop runs against scripted lines in tests.

pub mod command;
pub mod display;
pub mod input;
mod onboarding;
mod session;

pub use command::{Command, DEFAULT_HISTORY_LIMIT};
pub use input::{InputSource, ScriptedInput, StdinInput};
pub use onboarding::run_onboarding;
pub use session::{
    Session, SessionExit, SessionOptions, SessionState, TurnOutcome, MAX_STORAGE_FAILURES,
};
