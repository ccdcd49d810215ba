//! `show` command: what the history currently holds.
//!
//! Access tokens are never printed; each is shown as a SHA-256 fingerprint.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::Context;
use crate::cli::output::Envelope;
use crate::core::credential_hash::token_fingerprint;
use crate::error::Result;
use crate::storage::HistorySnapshot;
use crate::util::time::format_countdown;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRow {
    pub sanitized_base_uri: String,
    pub version: u32,
    pub api_base_uri: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRow {
    pub base_uri: String,
    pub display_name: String,
    pub token_fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRow {
    pub base_uri: String,
    pub provider: String,
    pub profile_id: String,
    pub display_name: String,
    pub two_factor: bool,
}

/// Printable view of a [`HistorySnapshot`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowReport {
    pub history_dir: String,
    pub discovered_apis: Vec<ApiRow>,
    pub saved_tokens: Vec<TokenRow>,
    pub saved_profiles: Vec<ProfileRow>,
}

impl ShowReport {
    #[must_use]
    pub fn from_snapshot(snapshot: &HistorySnapshot, history_dir: &Path) -> Self {
        let discovered_apis = snapshot
            .discovered_apis
            .iter()
            .map(|record| ApiRow {
                sanitized_base_uri: record.sanitized_base_uri.clone(),
                version: record.api.version,
                api_base_uri: record.api.api_base_uri.clone(),
                expires_at: record.expires_at,
                expires_in: format_countdown(record.expires_at, snapshot.taken_at),
            })
            .collect();

        let saved_tokens = snapshot
            .saved_tokens
            .iter()
            .map(|saved| TokenRow {
                base_uri: saved.instance.sanitized_base_uri(),
                display_name: saved.instance.display_name.clone(),
                token_fingerprint: token_fingerprint(&saved.access_token),
            })
            .collect();

        let saved_profiles = snapshot
            .saved_profiles
            .iter()
            .map(|saved| ProfileRow {
                base_uri: saved.instance.sanitized_base_uri(),
                provider: saved.instance.display_name.clone(),
                profile_id: saved.profile.profile_id.clone(),
                display_name: saved.profile.display_name.clone(),
                two_factor: saved.profile.two_factor,
            })
            .collect();

        Self {
            history_dir: history_dir.display().to_string(),
            discovered_apis,
            saved_tokens,
            saved_profiles,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.discovered_apis.is_empty()
            && self.saved_tokens.is_empty()
            && self.saved_profiles.is_empty()
    }

    #[must_use]
    pub fn render_human(&self) -> String {
        let mut out = format!("History directory: {}\n", self.history_dir);

        if self.is_empty() {
            out.push_str("\nNo saved history.");
            return out;
        }

        let _ = write!(out, "\nDiscovered APIs ({})", self.discovered_apis.len());
        for row in &self.discovered_apis {
            let _ = write!(
                out,
                "\n  {}  v{}  {}  expires {}",
                row.sanitized_base_uri, row.version, row.api_base_uri, row.expires_in
            );
        }

        let _ = write!(out, "\n\nSaved tokens ({})", self.saved_tokens.len());
        for row in &self.saved_tokens {
            let _ = write!(
                out,
                "\n  {}  {}  token {}",
                row.base_uri, row.display_name, row.token_fingerprint
            );
        }

        let _ = write!(out, "\n\nSaved profiles ({})", self.saved_profiles.len());
        for row in &self.saved_profiles {
            let _ = write!(
                out,
                "\n  {}  {}  {}{}",
                row.base_uri,
                row.profile_id,
                row.display_name,
                if row.two_factor { "  [2FA]" } else { "" }
            );
        }

        out
    }
}

/// Execute the show command.
///
/// # Errors
/// Returns an error if the store cannot be opened.
pub fn execute(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let snapshot = store.snapshot();
    let report = ShowReport::from_snapshot(&snapshot, store.backend().dir());

    ctx.emit(
        || report.render_human(),
        || Envelope::new("show", snapshot.taken_at, &report).render(ctx.pretty),
    )
}
