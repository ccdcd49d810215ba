//! CLI argument parsing and command dispatch.

pub mod args;
pub mod config;
pub mod maintenance;
pub mod output;
pub mod show;

use std::sync::Arc;

pub use args::{Cli, Commands, OutputFormat};

use crate::core::clock::SystemClock;
use crate::error::Result;
use crate::storage::{HistoryStore, JsonFileBackend, ResolvedConfig};

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ResolvedConfig,
    pub format: OutputFormat,
    pub pretty: bool,
}

impl Context {
    /// Open the history store under the resolved data directory.
    ///
    /// This runs the normal startup sequence, so expired discovered APIs
    /// are dropped and all slots are rewritten.
    ///
    /// # Errors
    /// Returns an error if the history files cannot be read, or if the
    /// startup save fails under the `propagate` policy.
    pub fn open_store(&self) -> Result<HistoryStore<JsonFileBackend>> {
        let backend = JsonFileBackend::new(self.config.history_dir());
        tracing::debug!(dir = %backend.dir().display(), "Opening history store");
        HistoryStore::open_with(
            backend,
            self.config.history_options(),
            Arc::new(SystemClock),
        )
    }

    /// Print a rendered result to stdout.
    fn emit(
        &self,
        human: impl FnOnce() -> String,
        json: impl FnOnce() -> Result<String>,
    ) -> Result<()> {
        let text = match self.format {
            OutputFormat::Human => human(),
            OutputFormat::Json => json()?,
        };
        println!("{text}");
        Ok(())
    }
}

/// Run one command. No subcommand means `show`.
///
/// # Errors
/// Propagates the command's error.
pub fn execute(command: Option<&Commands>, ctx: &Context) -> Result<()> {
    match command {
        None | Some(Commands::Show) => show::execute(ctx),
        Some(Commands::Purge) => maintenance::execute_purge(ctx),
        Some(Commands::Forget { uri }) => maintenance::execute_forget(uri, ctx),
        Some(Commands::Config) => config::execute(ctx),
    }
}
