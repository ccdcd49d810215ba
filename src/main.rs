//! vpnhist - inspect and maintain the VPN provider history
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use vpn_history::cli::output::render_error;
use vpn_history::cli::{self, Cli, Context};
use vpn_history::core::logging::{self, LogSettings};
use vpn_history::storage::ResolvedConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = cli.effective_format();

    // Config first: the file may carry the default log level
    let resolved = ResolvedConfig::resolve(cli.data_dir.as_deref());

    let (config_level, config_format) = resolved.as_ref().map_or((None, None), |config| {
        (config.log_level.as_deref(), config.log_format.as_deref())
    });
    let settings = LogSettings::resolve(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
        config_level,
        config_format,
        |key| std::env::var(key).ok(),
    );
    logging::init(&settings);

    let result = resolved.and_then(|config| {
        tracing::debug!(
            data_dir = %config.data_dir.display(),
            source = %config.sources.data_dir,
            "Configuration resolved"
        );
        let ctx = Context {
            config,
            format,
            pretty: cli.pretty,
        };
        cli::execute(cli.command.as_ref(), &ctx)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{}", e);
            eprintln!("{}", render_error(&e, format, cli.pretty));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
