//! Line input for the session loop
//!
//! The session reads whole lines through [`InputSource`]. `None` means end of
//! input (Ctrl-D, closed pipe, exhausted script).

use std::collections::VecDeque;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::debug;

#[allow(async_fn_in_trait)]
pub trait InputSource {
    /// Wait for the next line, without its trailing newline
    async fn next_line(&mut self) -> Option<String>;
}

/// Reads stdin on a dedicated thread so the async session can wait for a line
/// and a Ctrl-C at the same time.
pub struct StdinInput {
    rx: mpsc::UnboundedReceiver<String>,
}

impl StdinInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        });
        Self { rx }
    }
}

impl InputSource for StdinInput {
    async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Pre-recorded lines
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl InputSource for ScriptedInput {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}
