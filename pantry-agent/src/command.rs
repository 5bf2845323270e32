//! Session commands
//!
//! Anything typed at the prompt that is not one of these is treated as a
//! recipe request.

/// Entries shown by `history` when no count is given
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Profile,
    Model,
    History(usize),
    ClearHistory,
    Stats,
    Clear,
    Reset,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let lower = line.trim().to_lowercase();
        let mut words = lower.split_whitespace();
        let head = words.next()?;
        let arg = words.next();
        if words.next().is_some() {
            return None;
        }

        let command = match (head, arg) {
            ("help" | "h" | "?", None) => Command::Help,
            ("profile" | "p", None) => Command::Profile,
            ("model" | "m", None) => Command::Model,
            ("history", None) => Command::History(DEFAULT_HISTORY_LIMIT),
            ("history", Some("clear")) => Command::ClearHistory,
            ("history", Some(n)) => Command::History(n.parse().ok().filter(|n| *n > 0)?),
            ("stats" | "s", None) => Command::Stats,
            ("clear" | "c", None) => Command::Clear,
            ("reset" | "r", None) => Command::Reset,
            ("quit" | "exit" | "q", None) => Command::Quit,
            _ => return None,
        };
        Some(command)
    }
}

/// Whether a confirmation answer means yes
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
