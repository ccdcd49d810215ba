//! `purge` and `forget` commands.

use serde::Serialize;

use crate::cli::Context;
use crate::cli::output::Envelope;
use crate::core::models::sanitize_base_uri;
use crate::error::{HistoryError, Result};
use crate::storage::{HistoryStore, PersistencePort};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub purged: usize,
    pub remaining: usize,
}

impl PurgeReport {
    #[must_use]
    pub fn render_human(&self) -> String {
        format!(
            "Purged {} expired discovered API{}, {} remaining.",
            self.purged,
            if self.purged == 1 { "" } else { "s" },
            self.remaining
        )
    }
}

/// Drop expired discovered APIs, counting those dropped while opening.
///
/// # Errors
/// Returns an error if persisting fails under the `propagate` policy.
pub fn purge<B: PersistencePort>(store: &mut HistoryStore<B>) -> Result<PurgeReport> {
    let purged = store.purged_at_open() + store.purge_expired()?;
    Ok(PurgeReport {
        purged,
        remaining: store.snapshot().discovered_apis.len(),
    })
}

/// Execute the purge command.
///
/// # Errors
/// Returns an error if the store cannot be opened or saved.
pub fn execute_purge(ctx: &Context) -> Result<()> {
    let mut store = ctx.open_store()?;
    let report = purge(&mut store)?;
    tracing::info!(purged = report.purged, "Purge complete");

    ctx.emit(
        || report.render_human(),
        || Envelope::new("purge", store.now(), &report).render(ctx.pretty),
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgetReport {
    pub sanitized_base_uri: String,
    pub removed_token: bool,
    pub removed_profiles: usize,
    pub removed_discovered_api: bool,
}

impl ForgetReport {
    #[must_use]
    pub const fn removed_anything(&self) -> bool {
        self.removed_token || self.removed_profiles > 0 || self.removed_discovered_api
    }

    #[must_use]
    pub fn render_human(&self) -> String {
        if !self.removed_anything() {
            return format!("Nothing stored for {}.", self.sanitized_base_uri);
        }
        format!(
            "Forgot {}: token {}, {} profile{}, discovered API {}.",
            self.sanitized_base_uri,
            if self.removed_token { "removed" } else { "absent" },
            self.removed_profiles,
            if self.removed_profiles == 1 { "" } else { "s" },
            if self.removed_discovered_api {
                "removed"
            } else {
                "absent"
            },
        )
    }
}

/// Forget everything stored for one provider.
///
/// # Errors
/// Returns an error if `uri` is blank, or if persisting fails under the
/// `propagate` policy.
pub fn forget<B: PersistencePort>(store: &mut HistoryStore<B>, uri: &str) -> Result<ForgetReport> {
    let sanitized = sanitize_base_uri(uri);
    if sanitized.is_empty() {
        return Err(HistoryError::Config(
            "provider URI must not be empty".to_string(),
        ));
    }
    let removed_token = store.get_saved_token(&sanitized).is_some();
    let removed_profiles = store
        .get_saved_profile_list()
        .iter()
        .filter(|saved| saved.instance.has_base_uri(&sanitized))
        .count();
    let removed_discovered_api = store.get_cached_discovered_api(&sanitized).is_some();

    store.forget_instance(&sanitized)?;

    Ok(ForgetReport {
        sanitized_base_uri: sanitized,
        removed_token,
        removed_profiles,
        removed_discovered_api,
    })
}

/// Execute the forget command.
///
/// # Errors
/// Returns an error if the store cannot be opened or saved.
pub fn execute_forget(uri: &str, ctx: &Context) -> Result<()> {
    let mut store = ctx.open_store()?;
    let report = forget(&mut store, uri)?;

    ctx.emit(
        || report.render_human(),
        || Envelope::new("forget", store.now(), &report).render(ctx.pretty),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::storage::{HistoryOptions, MemoryBackend};
    use crate::test_utils::{
        make_test_discovered_api, make_test_instance, make_test_saved_profile, test_clock,
    };
    use chrono::TimeDelta;
    use std::sync::Arc;

    const URI_A: &str = "https://vpn.example.org";
    const URI_B: &str = "https://vpn.example.net";

    fn open(backend: &MemoryBackend, clock: &ManualClock) -> HistoryStore<MemoryBackend> {
        HistoryStore::open_with(
            backend.clone(),
            HistoryOptions::default(),
            Arc::new(clock.clone()),
        )
        .unwrap()
    }

    #[test]
    fn purge_counts_entries_dropped_at_open() {
        let backend = MemoryBackend::new();
        let clock = test_clock();
        let mut store = open(&backend, &clock);
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        clock.advance(TimeDelta::days(20));
        store
            .cache_discovered_api(URI_B, make_test_discovered_api(URI_B))
            .unwrap();
        drop(store);

        clock.advance(TimeDelta::days(11));
        let mut store = open(&backend, &clock);
        let report = purge(&mut store).unwrap();

        assert_eq!(report.purged, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(
            report.render_human(),
            "Purged 1 expired discovered API, 1 remaining."
        );
    }

    #[test]
    fn purge_catches_entries_expiring_after_open() {
        let backend = MemoryBackend::new();
        let clock = test_clock();
        let mut store = open(&backend, &clock);
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();

        clock.advance(TimeDelta::days(30));
        let report = purge(&mut store).unwrap();
        assert_eq!(report.purged, 1);
        assert_eq!(report.remaining, 0);
    }

    #[test]
    fn forget_reports_what_was_removed() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend, &test_clock());
        store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_A, "internet"))
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_A, "office"))
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_B, "internet"))
            .unwrap();

        let report = forget(&mut store, "https://vpn.example.org/").unwrap();

        assert_eq!(report.sanitized_base_uri, URI_A);
        assert!(report.removed_token);
        assert_eq!(report.removed_profiles, 2);
        assert!(!report.removed_discovered_api);
        assert_eq!(
            report.render_human(),
            "Forgot https://vpn.example.org: token removed, 2 profiles, discovered API absent."
        );
        assert_eq!(store.get_saved_profile_list().len(), 1);
        assert!(store.get_saved_token(URI_A).is_none());
    }

    #[test]
    fn forget_rejects_blank_uri() {
        let mut store = open(&MemoryBackend::new(), &test_clock());
        let err = forget(&mut store, " / ").unwrap_err();
        assert_eq!(err.error_code(), "VPNH-C003");
    }

    #[test]
    fn forget_unknown_provider() {
        let mut store = open(&MemoryBackend::new(), &test_clock());
        let report = forget(&mut store, URI_B).unwrap();
        assert!(!report.removed_anything());
        assert_eq!(report.render_human(), "Nothing stored for https://vpn.example.net.");
    }
}
