//! `config` command: resolved settings and their sources.

use chrono::Utc;
use serde::Serialize;

use crate::cli::Context;
use crate::cli::output::Envelope;
use crate::error::Result;
use crate::storage::ResolvedConfig;

const SECS_PER_DAY: u64 = 24 * 3600;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSourcesReport {
    pub data_dir: String,
    pub discovered_api_ttl: String,
    pub save_policy: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReport {
    pub config_path: String,
    pub config_file_exists: bool,
    pub data_dir: String,
    pub history_dir: String,
    pub discovered_api_ttl_days: u64,
    pub save_policy: &'static str,
    pub sources: ConfigSourcesReport,
}

impl ConfigReport {
    #[must_use]
    pub fn from_resolved(config: &ResolvedConfig) -> Self {
        Self {
            config_path: config.config_path.display().to_string(),
            config_file_exists: config.config_path.exists(),
            data_dir: config.data_dir.display().to_string(),
            history_dir: config.history_dir().display().to_string(),
            discovered_api_ttl_days: config.discovered_api_ttl.as_secs() / SECS_PER_DAY,
            save_policy: config.save_policy.as_str(),
            sources: ConfigSourcesReport {
                data_dir: config.sources.data_dir.to_string(),
                discovered_api_ttl: config.sources.discovered_api_ttl.to_string(),
                save_policy: config.sources.save_policy.to_string(),
            },
        }
    }

    #[must_use]
    pub fn render_human(&self) -> String {
        let file_note = if self.config_file_exists {
            ""
        } else {
            " (not found, using defaults)"
        };
        format!(
            "Config file: {}{file_note}\n\
             Data directory: {} ({})\n\
             History directory: {}\n\
             Discovered API TTL: {} day{} ({})\n\
             Save failure policy: {} ({})",
            self.config_path,
            self.data_dir,
            self.sources.data_dir,
            self.history_dir,
            self.discovered_api_ttl_days,
            if self.discovered_api_ttl_days == 1 { "" } else { "s" },
            self.sources.discovered_api_ttl,
            self.save_policy,
            self.sources.save_policy,
        )
    }
}

/// Execute the config command. The store is not opened.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn execute(ctx: &Context) -> Result<()> {
    let report = ConfigReport::from_resolved(&ctx.config);
    ctx.emit(
        || report.render_human(),
        || Envelope::new("config", Utc::now(), &report).render(ctx.pretty),
    )
}
