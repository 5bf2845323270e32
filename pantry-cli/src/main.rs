//! # PantryVision CLI
//!
//! Command-line interface for the recipe agent.
//!
//! Usage:
//!   pantry                      interactive session (same as `pantry chat`)
//!   pantry ask <request>        one request against the stored profile
//!   pantry profile              show the stored profile
//!   pantry history [--limit N]  show recent requests
//!   pantry stats                show request statistics
//!
//! Examples:
//!   pantry
//!   pantry ask "quick vegetarian lunch"
//!   pantry --model gpt-4o ask "high protein breakfast"
//!   pantry history --limit 20 --json

use clap::{Parser, Subcommand};
use pantry_agent::{
    display, InputSource, ScriptedInput, Session, SessionExit, SessionOptions, StdinInput,
    TurnOutcome,
};
use pantry_core::{
    AgentConfig, Error, ErrorKind, FileBackend, HistoryStore, MemoryBackend, OpenAIProvider,
    ProfileStore, RecipeGenerator, Result, StoreBackend,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_STARTUP: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(author, version, about = "PantryVision - recipes that fit your profile")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "PANTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for profile.json and history.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Model to use, overriding the profile and config
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Keep the profile and history in memory only
    #[arg(long, global = true)]
    no_save: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default)
    Chat,
    /// Ask for one recipe using the stored profile
    Ask {
        /// The request, e.g. "vegetarian lunch ideas"
        #[arg(trailing_var_arg = true, required = true)]
        request: Vec<String>,
    },
    /// Show the stored profile
    Profile,
    /// Show recent requests
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show request statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Config file and environment, then command-line flags
fn resolve_config(cli: &Cli) -> Result<AgentConfig> {
    let base = AgentConfig::load(cli.config.as_deref())?;
    let flags = AgentConfig {
        data_dir: cli.data_dir.clone(),
        save_data: cli.no_save.then_some(false),
        ..Default::default()
    };
    let config = base.merge(&flags);
    config.validate()?;
    debug!(?config, "resolved configuration");
    Ok(config)
}

/// File storage under the data directory, or memory when saving is off
fn storage(config: &AgentConfig) -> Result<Arc<dyn StoreBackend>> {
    if config.save_data() {
        Ok(Arc::new(FileBackend::new(config.data_dir())?))
    } else {
        debug!("saving disabled, using in-memory storage");
        Ok(Arc::new(MemoryBackend::new()))
    }
}

/// Read-only commands always look at what is on disk
fn file_storage(config: &AgentConfig) -> Result<Arc<dyn StoreBackend>> {
    Ok(Arc::new(FileBackend::new(config.data_dir())?))
}

fn build_session<I: InputSource>(
    cli: &Cli,
    config: &AgentConfig,
    backend: Arc<dyn StoreBackend>,
    input: I,
) -> Result<Session<OpenAIProvider, I, io::Stdout>> {
    let provider = OpenAIProvider::new(config.provider_config()?)?;
    let options = SessionOptions::from_config(config).with_model_override(cli.model.clone());
    Ok(Session::new(
        ProfileStore::with_backend(backend.clone()),
        HistoryStore::with_backend(backend),
        RecipeGenerator::new(provider),
        input,
        io::stdout(),
        options,
    ))
}

fn report(err: &Error) {
    debug!(error = %err, "command failed");
    let _ = display::error(&mut io::stderr(), err.message());
}

/// Where an interactive session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Reading the stored profile or onboarding
    Startup,
    /// Serving requests
    Running,
}

fn exit_code(phase: Phase, result: &Result<SessionExit>) -> u8 {
    match (result, phase) {
        (Ok(_), _) => 0,
        (Err(_), Phase::Startup) => EXIT_STARTUP,
        (Err(_), Phase::Running) => EXIT_FAILURE,
    }
}

fn finish(phase: Phase, result: Result<SessionExit>) -> ExitCode {
    if let Err(e) = &result {
        report(e);
    }
    ExitCode::from(exit_code(phase, &result))
}

fn interrupted() -> ExitCode {
    println!();
    let _ = display::info(&mut io::stdout(), "Interrupted. Goodbye!");
    ExitCode::from(EXIT_INTERRUPTED)
}

async fn run_chat(cli: &Cli, config: &AgentConfig) -> ExitCode {
    let session = storage(config)
        .and_then(|backend| build_session(cli, config, backend, StdinInput::spawn()));
    let mut session = match session {
        Ok(session) => session,
        Err(e) => {
            report(&e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    if let Err(e) = display::banner(&mut io::stdout()) {
        return finish(Phase::Startup, Err(e.into()));
    }
    let started = tokio::select! {
        result = session.start() => result,
        _ = tokio::signal::ctrl_c() => return interrupted(),
    };
    match started {
        Ok(Some(exit)) => return finish(Phase::Startup, Ok(exit)),
        Ok(None) => {}
        Err(e) => return finish(Phase::Startup, Err(e)),
    }

    tokio::select! {
        result = session.serve() => finish(Phase::Running, result),
        _ = tokio::signal::ctrl_c() => interrupted(),
    }
}

async fn run_ask(cli: &Cli, config: &AgentConfig, request: &str) -> ExitCode {
    let session = file_storage(config)
        .and_then(|backend| build_session(cli, config, backend, ScriptedInput::default()));
    let mut session = match session {
        Ok(session) => session,
        Err(e) => {
            report(&e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    tokio::select! {
        outcome = session.ask(request) => match outcome {
            Ok(TurnOutcome::Recipe(_)) => ExitCode::SUCCESS,
            Ok(_) => ExitCode::from(EXIT_FAILURE),
            Err(e) if e.kind() == ErrorKind::ProfileNotFound => {
                let _ = display::error(
                    &mut io::stderr(),
                    "No profile yet. Run `pantry` once to set one up.",
                );
                ExitCode::from(EXIT_STARTUP)
            }
            Err(e) => {
                report(&e);
                ExitCode::from(EXIT_FAILURE)
            }
        },
        _ = tokio::signal::ctrl_c() => ExitCode::from(EXIT_INTERRUPTED),
    }
}

fn show_profile(config: &AgentConfig) -> Result<()> {
    let profiles = ProfileStore::with_backend(file_storage(config)?);
    match profiles.load() {
        Ok(profile) => display::profile(&mut io::stdout(), &profile)?,
        Err(e) if e.kind() == ErrorKind::ProfileNotFound => {
            display::info(&mut io::stdout(), "No profile yet. Run `pantry` to set one up.")?
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

fn show_history(config: &AgentConfig, limit: usize, json: bool) -> Result<()> {
    let history = HistoryStore::with_backend(file_storage(config)?);
    let entries = history.list(Some(limit))?;
    if json {
        let text = serde_json::to_string_pretty(&entries)
            .map_err(|e| Error::serialization_failed(e.to_string()))?;
        println!("{}", text);
    } else {
        display::history(&mut io::stdout(), &entries)?;
    }
    Ok(())
}

fn show_stats(config: &AgentConfig, json: bool) -> Result<()> {
    let backend = file_storage(config)?;
    let stats = HistoryStore::with_backend(backend.clone()).stats()?;
    if json {
        let text = serde_json::to_string_pretty(&stats)
            .map_err(|e| Error::serialization_failed(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }
    let profile = ProfileStore::with_backend(backend).load().ok();
    display::stats(&mut io::stdout(), &stats, profile.as_ref())?;
    Ok(())
}

fn exit_for(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            report(&e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    match &cli.command {
        None | Some(Commands::Chat) => run_chat(&cli, &config).await,
        Some(Commands::Ask { request }) => run_ask(&cli, &config, &request.join(" ")).await,
        Some(Commands::Profile) => exit_for(show_profile(&config)),
        Some(Commands::History { limit, json }) => exit_for(show_history(&config, *limit, *json)),
        Some(Commands::Stats { json }) => exit_for(show_stats(&config, *json)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_profile_at_startup_exits_2() {
        for kind in [ErrorKind::IoFailed, ErrorKind::PermissionDenied, ErrorKind::ProfileCorrupt] {
            let result = Err(Error::new(kind, "profile.json could not be read"));
            assert_eq!(exit_code(Phase::Startup, &result), EXIT_STARTUP, "{:?}", kind);
        }
    }

    #[test]
    fn test_runtime_storage_failure_exits_1() {
        let result = Err(Error::storage_corrupt("history.json is not valid JSON"));
        assert_eq!(exit_code(Phase::Running, &result), EXIT_FAILURE);
        let result = Err(Error::storage_failed("disk full"));
        assert_eq!(exit_code(Phase::Running, &result), EXIT_FAILURE);
    }

    #[test]
    fn test_normal_exits_succeed() {
        assert_eq!(exit_code(Phase::Startup, &Ok(SessionExit::EndOfInput)), 0);
        assert_eq!(exit_code(Phase::Running, &Ok(SessionExit::Quit)), 0);
    }
}
