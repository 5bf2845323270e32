//! Interactive session loop
//!
//! `Onboarding -> Ready <-> AwaitingModelSelection`. Each turn reads one line;
//! commands are handled in place, everything else becomes a recipe request.
//! Generation failures never end the session. Storage failures end it only
//! after [`MAX_STORAGE_FAILURES`] in a row.

use crate::command::{is_yes, Command};
use crate::display;
use crate::input::InputSource;
use crate::onboarding::run_onboarding;
use pantry_core::{
    interpret, AgentConfig, Error, ErrorKind, GenerationOptions, HistoryEntry, HistoryStore,
    LlmProvider, Profile, ProfileState, ProfileStore, Recipe, RecipeGenerator, Result,
};
use std::io::Write;
use tracing::{debug, info, warn};

/// Consecutive failed writes before the session gives up
pub const MAX_STORAGE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Onboarding,
    Ready,
    AwaitingModelSelection,
}

/// Why the loop stopped normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Quit,
    EndOfInput,
}

/// Result of one recipe request
#[derive(Debug)]
pub enum TurnOutcome {
    Recipe(Recipe),
    /// Nothing usable in the utterance; the provider was not called
    Rejected(String),
    /// Transport failure, safe to ask again; nothing was recorded
    TransientFailure(Error),
    /// Permanent failure, recorded in the history
    Failed(Error),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub generation: GenerationOptions,
    /// Model from configuration, used when the profile names none
    pub default_model: String,
    /// `--model` from the command line; wins over everything
    pub model_override: Option<String>,
}

impl SessionOptions {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            generation: GenerationOptions::from_config(config),
            default_model: config.model().to_string(),
            model_override: None,
        }
    }

    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }
}

pub struct Session<P: LlmProvider, I: InputSource, W: Write> {
    profiles: ProfileStore,
    history: HistoryStore,
    generator: RecipeGenerator<P>,
    input: I,
    out: W,
    options: SessionOptions,
    state: SessionState,
    profile: Option<Profile>,
    storage_failures: u32,
}

impl<P: LlmProvider, I: InputSource, W: Write> Session<P, I, W> {
    pub fn new(
        profiles: ProfileStore,
        history: HistoryStore,
        generator: RecipeGenerator<P>,
        input: I,
        out: W,
        options: SessionOptions,
    ) -> Self {
        Self {
            profiles,
            history,
            generator,
            input,
            out,
            options,
            state: SessionState::Onboarding,
            profile: None,
            storage_failures: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn generator(&self) -> &RecipeGenerator<P> {
        &self.generator
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// `--model`, then the profile's choice, then configuration
    pub fn active_model(&self) -> String {
        self.options
            .model_override
            .clone()
            .or_else(|| self.profile.as_ref().and_then(|p| p.model.clone()))
            .unwrap_or_else(|| self.options.default_model.clone())
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "session state");
            self.state = state;
        }
    }

    /// Load the stored profile, or onboard when there is none. Returns
    /// `Some(EndOfInput)` if input ended during onboarding. An error here means
    /// the profile store itself could not be read.
    pub async fn start(&mut self) -> Result<Option<SessionExit>> {
        let existing = match self.profiles.open()? {
            ProfileState::Loaded(profile) => Some(profile),
            ProfileState::Missing => None,
            ProfileState::Quarantined(to) => {
                display::warning(
                    &mut self.out,
                    &format!("Your saved profile could not be read and was moved to {}.", to),
                )?;
                display::info(&mut self.out, "Let's create a new one.")?;
                None
            }
        };

        match existing {
            Some(profile) => {
                display::success(&mut self.out, "Welcome back! Your profile has been loaded.")?;
                self.profile = Some(profile);
                self.set_state(SessionState::Ready);
                Ok(None)
            }
            None => {
                if self.onboard(None).await? {
                    Ok(None)
                } else {
                    Ok(Some(SessionExit::EndOfInput))
                }
            }
        }
    }

    /// Run the whole interactive session
    pub async fn run(&mut self) -> Result<SessionExit> {
        display::banner(&mut self.out)?;
        if let Some(exit) = self.start().await? {
            return Ok(exit);
        }
        self.serve().await
    }

    /// The request loop of a started session
    pub async fn serve(&mut self) -> Result<SessionExit> {
        display::ready(&mut self.out)?;

        loop {
            writeln!(self.out)?;
            display::prompt(&mut self.out, "What would you like to eat?")?;
            let Some(line) = self.input.next_line().await else {
                writeln!(self.out)?;
                return Ok(SessionExit::EndOfInput);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(command) = Command::parse(line) {
                if let Some(exit) = self.handle_command(command).await? {
                    return Ok(exit);
                }
                continue;
            }

            self.handle_request(line).await?;
        }
    }

    /// One-shot request against the stored profile
    pub async fn ask(&mut self, utterance: &str) -> Result<TurnOutcome> {
        let profile = self.profiles.load().map_err(|e| e.with_operation("session::ask"))?;
        self.profile = Some(profile);
        self.set_state(SessionState::Ready);
        self.handle_request(utterance).await
    }

    /// Interpret, generate, display and record one request. Only a fatal
    /// storage failure or a broken output stream is returned as an error.
    pub async fn handle_request(&mut self, utterance: &str) -> Result<TurnOutcome> {
        let Some(profile) = self.profile.clone() else {
            return Err(Error::unexpected("no profile loaded").with_operation("session::handle_request"));
        };

        let request = match interpret(utterance, &profile) {
            Ok(request) => request,
            Err(e) if e.kind() == ErrorKind::RequestRejected => {
                debug!(utterance, "request rejected");
                display::warning(
                    &mut self.out,
                    "I couldn't find a dish or ingredient in that. Try something like \
                     'quick vegetarian dinner' or 'high protein breakfast'.",
                )?;
                return Ok(TurnOutcome::Rejected(e.message().to_string()));
            }
            Err(e) => return Err(e),
        };

        if !request.allergen_mentions().is_empty() {
            display::allergen_warning(&mut self.out, request.allergen_mentions())?;
        }

        let model = self.active_model();
        display::info(&mut self.out, "Generating your personalized recipe...")?;

        match self
            .generator
            .generate(&request, &model, &self.options.generation)
            .await
        {
            Ok(recipe) => {
                display::recipe(&mut self.out, &recipe)?;
                self.record(HistoryEntry::success(request, model, recipe.clone()))?;
                Ok(TurnOutcome::Recipe(recipe))
            }
            Err(e) if e.is_transport() => {
                warn!(error = %e, "generation call failed");
                display::error(
                    &mut self.out,
                    &format!(
                        "Couldn't reach the recipe service: {}. Nothing was saved; please try again.",
                        e.message()
                    ),
                )?;
                Ok(TurnOutcome::TransientFailure(e))
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                let message = match e.kind() {
                    ErrorKind::MalformedResponse => {
                        "The recipe service sent back something that wasn't a usable recipe.".to_string()
                    }
                    _ => format!("The recipe service refused the request: {}", e.message()),
                };
                display::error(&mut self.out, &message)?;
                self.record(HistoryEntry::failure(request, model, &e))?;
                Ok(TurnOutcome::Failed(e))
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<Option<SessionExit>> {
        debug!(?command, "command");
        match command {
            Command::Help => display::help(&mut self.out)?,
            Command::Profile => return self.edit_profile().await,
            Command::Model => return self.select_model().await,
            Command::History(limit) => match self.history.list(Some(limit)) {
                Ok(entries) => display::history(&mut self.out, &entries)?,
                Err(e) => display::error(&mut self.out, &format!("Could not read history: {}", e.message()))?,
            },
            Command::Stats => {
                match self.history.stats() {
                    Ok(stats) => display::stats(&mut self.out, &stats, self.profile.as_ref())?,
                    Err(e) => display::error(&mut self.out, &format!("Could not read history: {}", e.message()))?,
                }
                let usage = self.generator.usage();
                if usage.total_calls > 0 {
                    writeln!(
                        self.out,
                        "This session:        {} calls, {} tokens",
                        usage.total_calls,
                        usage.total_tokens()
                    )?;
                }
            }
            Command::Clear => display::clear_screen(&mut self.out)?,
            Command::ClearHistory => return self.clear_history().await,
            Command::Reset => return self.reset().await,
            Command::Quit => {
                display::success(&mut self.out, "Thanks for using PantryVision! Enjoy your meals!")?;
                return Ok(Some(SessionExit::Quit));
            }
        }
        Ok(None)
    }

    /// Run the questionnaire and persist the result. `false` on end of input.
    async fn onboard(&mut self, existing: Option<Profile>) -> Result<bool> {
        self.set_state(SessionState::Onboarding);
        let Some(profile) = run_onboarding(&mut self.input, &mut self.out, existing.as_ref()).await? else {
            return Ok(false);
        };
        let saved = self.save_profile(&profile)?;
        self.profile = Some(profile);
        self.set_state(SessionState::Ready);
        if saved {
            display::success(&mut self.out, "Profile saved!")?;
        } else {
            display::warning(
                &mut self.out,
                "Your profile will be used for this session but was not saved.",
            )?;
        }
        Ok(true)
    }

    async fn edit_profile(&mut self) -> Result<Option<SessionExit>> {
        let Some(profile) = self.profile.clone() else {
            return Ok(None);
        };
        display::profile(&mut self.out, &profile)?;
        display::prompt(&mut self.out, "Update your profile? (y/N)")?;
        let Some(answer) = self.input.next_line().await else {
            return Ok(Some(SessionExit::EndOfInput));
        };
        if !is_yes(&answer) {
            return Ok(None);
        }
        if self.onboard(Some(profile)).await? {
            Ok(None)
        } else {
            Ok(Some(SessionExit::EndOfInput))
        }
    }

    async fn select_model(&mut self) -> Result<Option<SessionExit>> {
        self.set_state(SessionState::AwaitingModelSelection);
        let models = self.generator.provider().models();
        let active = self.active_model();

        writeln!(self.out)?;
        display::info(&mut self.out, "Available models:")?;
        for (i, model) in models.iter().enumerate() {
            let marker = if *model == active { " (current)" } else { "" };
            writeln!(self.out, "  {}. {}{}", i + 1, model, marker)?;
        }
        display::prompt(&mut self.out, "Choose a model by number or name (Enter to cancel):")?;

        let Some(answer) = self.input.next_line().await else {
            return Ok(Some(SessionExit::EndOfInput));
        };
        self.set_state(SessionState::Ready);

        let answer = answer.trim();
        if answer.is_empty() {
            display::info(&mut self.out, "Model unchanged.")?;
            return Ok(None);
        }
        let chosen = match answer.parse::<usize>() {
            Ok(n) if (1..=models.len()).contains(&n) => Some(models[n - 1].clone()),
            Ok(_) => None,
            Err(_) => models.iter().find(|m| m.eq_ignore_ascii_case(answer)).cloned(),
        };
        let Some(model) = chosen else {
            display::warning(&mut self.out, &format!("'{}' is not one of the listed models.", answer))?;
            return Ok(None);
        };

        let mut saved = true;
        if let Some(mut profile) = self.profile.clone() {
            profile.set_model(model.clone());
            saved = self.save_profile(&profile)?;
            self.profile = Some(profile);
        }
        if saved {
            display::success(&mut self.out, &format!("Now using {}.", model))?;
        } else {
            display::warning(
                &mut self.out,
                &format!("Using {} for this session only; the choice was not saved.", model),
            )?;
        }
        if let Some(forced) = &self.options.model_override {
            display::warning(
                &mut self.out,
                &format!("--model {} still applies for this session.", forced),
            )?;
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<Option<SessionExit>> {
        display::prompt(
            &mut self.out,
            "This deletes your profile and request history. Are you sure? (y/N)",
        )?;
        let Some(answer) = self.input.next_line().await else {
            return Ok(Some(SessionExit::EndOfInput));
        };
        if !is_yes(&answer) {
            display::info(&mut self.out, "Reset cancelled.")?;
            return Ok(None);
        }

        if let Err(e) = self.profiles.clear().and_then(|_| self.history.clear()) {
            self.storage_failed(e)?;
            return Ok(None);
        }
        self.storage_failures = 0;
        self.profile = None;
        info!("profile and history reset");
        display::success(&mut self.out, "Your data has been reset.")?;

        if self.onboard(None).await? {
            Ok(None)
        } else {
            Ok(Some(SessionExit::EndOfInput))
        }
    }

    async fn clear_history(&mut self) -> Result<Option<SessionExit>> {
        display::prompt(&mut self.out, "This deletes your request history. Are you sure? (y/N)")?;
        let Some(answer) = self.input.next_line().await else {
            return Ok(Some(SessionExit::EndOfInput));
        };
        if !is_yes(&answer) {
            display::info(&mut self.out, "History kept.")?;
            return Ok(None);
        }
        match self.history.clear() {
            Ok(()) => {
                self.storage_failures = 0;
                info!("history cleared");
                display::success(&mut self.out, "Your request history has been cleared.")?;
            }
            Err(e) => self.storage_failed(e)?,
        }
        Ok(None)
    }

    /// `Ok(false)` when the write failed but the session can go on
    fn save_profile(&mut self, profile: &Profile) -> Result<bool> {
        match self.profiles.save(profile) {
            Ok(()) => {
                self.storage_failures = 0;
                Ok(true)
            }
            Err(e) => self.storage_failed(e).map(|()| false),
        }
    }

    fn record(&mut self, entry: HistoryEntry) -> Result<()> {
        match self.history.append(entry) {
            Ok(()) => {
                self.storage_failures = 0;
                Ok(())
            }
            Err(e) => self.storage_failed(e),
        }
    }

    /// Report a failed write; fatal once the limit is reached
    fn storage_failed(&mut self, e: Error) -> Result<()> {
        if !e.kind().is_storage() {
            return Err(e);
        }
        self.storage_failures += 1;
        warn!(error = %e, failures = self.storage_failures, "write failed");
        if self.storage_failures >= MAX_STORAGE_FAILURES {
            return Err(e
                .persist()
                .with_operation("session::storage_failed")
                .with_context("consecutive_failures", self.storage_failures.to_string()));
        }
        display::warning(
            &mut self.out,
            &format!("Could not save your data: {}", e.message()),
        )?;
        if e.kind() == ErrorKind::StorageCorrupt {
            display::info(
                &mut self.out,
                "Your request history could not be read. Type 'history clear' to start a new one.",
            )?;
        }
        Ok(())
    }
}
