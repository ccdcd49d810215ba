//! Provider history store.
//!
//! Remembers what the client learned about VPN providers so later sessions
//! can skip steps:
//! - **Discovered APIs**: endpoint documents, kept for 30 days by default
//! - **Saved tokens**: at most one access token per provider
//! - **Saved profiles**: profiles the user connected with before
//!
//! The three collections are persisted together through a
//! [`PersistencePort`]. Every mutation rewrites all of them.
//!
//! ## Lifecycle
//!
//! Opening a store loads every slot (absent or unreadable slots start
//! empty), purges expired discovered APIs, and saves right away so the
//! purge cost is paid once at startup.
//!
//! ## Save failures
//!
//! What a mutation does when persisting fails is a [`SavePolicy`]. The
//! in-memory change is kept either way; [`HistoryStore::save`] can be
//! called again later.
//!
//! All provider URIs passed in are run through [`sanitize_base_uri`] first.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::clock::{Clock, SystemClock};
use crate::core::models::{DiscoveredApi, Instance, SavedProfile, SavedToken, sanitize_base_uri};
use crate::error::{HistoryError, Result};
use crate::storage::backend::{PersistencePort, Slot};
use crate::storage::cache::TtlCache;

/// Default lifetime of a discovered API (30 days).
pub const DEFAULT_DISCOVERED_API_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// What a mutation does when persisting its result fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SavePolicy {
    /// Log a warning and report success.
    #[default]
    #[serde(rename = "log")]
    LogAndContinue,
    /// Return the persistence error to the caller.
    #[serde(rename = "propagate")]
    Propagate,
}

impl SavePolicy {
    /// Parse from a config/CLI value (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" | "ignore" | "continue" => Some(Self::LogAndContinue),
            "propagate" | "error" | "fail" => Some(Self::Propagate),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LogAndContinue => "log",
            Self::Propagate => "propagate",
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryOptions {
    /// TTL applied to newly cached discovered APIs.
    pub discovered_api_ttl: Duration,
    pub save_policy: SavePolicy,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            discovered_api_ttl: DEFAULT_DISCOVERED_API_TTL,
            save_policy: SavePolicy::default(),
        }
    }
}

impl HistoryOptions {
    #[must_use]
    pub const fn with_discovered_api_ttl(mut self, ttl: Duration) -> Self {
        self.discovered_api_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_save_policy(mut self, policy: SavePolicy) -> Self {
        self.save_policy = policy;
        self
    }
}

/// A discovered API together with its cache key and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredApiRecord {
    pub sanitized_base_uri: String,
    pub api: DiscoveredApi,
    pub expires_at: DateTime<Utc>,
}

/// Owned copy of the store's state at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub taken_at: DateTime<Utc>,
    /// Unexpired entries only, sorted by URI.
    pub discovered_apis: Vec<DiscoveredApiRecord>,
    pub saved_tokens: Vec<SavedToken>,
    pub saved_profiles: Vec<SavedProfile>,
}

/// Discovered-API cache, saved tokens and saved profiles kept in sync with
/// a persistence backend.
pub struct HistoryStore<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    options: HistoryOptions,
    discovered_api_cache: TtlCache<DiscoveredApi>,
    saved_profiles: Vec<SavedProfile>,
    saved_tokens: Vec<SavedToken>,
    purged_at_open: usize,
}

impl<B: PersistencePort> HistoryStore<B> {
    /// Open a store with default options and the system clock.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read, or if the startup
    /// save fails under [`SavePolicy::Propagate`].
    pub fn open(backend: B) -> Result<Self> {
        Self::open_with(backend, HistoryOptions::default(), Arc::new(SystemClock))
    }

    /// Open a store: load, purge expired discovered APIs, save.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read, or if the startup
    /// save fails under [`SavePolicy::Propagate`].
    pub fn open_with(backend: B, options: HistoryOptions, clock: Arc<dyn Clock>) -> Result<Self> {
        let discovered_api_cache = TtlCache::new(options.discovered_api_ttl);
        let mut store = Self {
            backend,
            clock,
            options,
            discovered_api_cache,
            saved_profiles: Vec::new(),
            saved_tokens: Vec::new(),
            purged_at_open: 0,
        };

        store.load()?;
        let purged = store.purge_cache();
        if purged > 0 {
            tracing::info!(purged, "Purged expired discovered APIs at startup");
        }
        store.purged_at_open = purged;
        // Persist right away; the purge may have shrunk the cache
        store.persist()?;

        tracing::debug!(
            discovered_apis = store.discovered_api_cache.len(),
            saved_tokens = store.saved_tokens.len(),
            saved_profiles = store.saved_profiles.len(),
            "History store opened"
        );
        Ok(store)
    }

    // =========================================================================
    // Load / save
    // =========================================================================

    /// Read every slot, then replace in-memory state. A read error leaves the
    /// store untouched.
    fn load(&mut self) -> Result<()> {
        let profiles = self.load_slot::<Vec<SavedProfile>>(Slot::SavedProfiles)?;
        let tokens = self.load_slot::<Vec<SavedToken>>(Slot::SavedTokens)?;
        let cache = self.load_slot::<TtlCache<DiscoveredApi>>(Slot::DiscoveredApiCache)?;

        self.saved_profiles = profiles.unwrap_or_else(|| {
            tracing::info!("No saved profiles found.");
            Vec::new()
        });

        self.saved_tokens = tokens.unwrap_or_else(|| {
            tracing::info!("No saved tokens found.");
            Vec::new()
        });

        let ttl = self.options.discovered_api_ttl;
        self.discovered_api_cache = match cache {
            Some(mut cache) => {
                cache.set_ttl(ttl);
                cache
            }
            None => {
                tracing::info!("No discovered API cache found.");
                TtlCache::new(ttl)
            }
        };

        Ok(())
    }

    /// Read and decode one slot. Undecodable blobs count as absent.
    fn load_slot<T: DeserializeOwned>(&self, slot: Slot) -> Result<Option<T>> {
        let Some(blob) = self.backend.load(slot)? else {
            return Ok(None);
        };

        match serde_json::from_str(&blob) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(%slot, error = %e, "Ignoring unreadable history slot");
                Ok(None)
            }
        }
    }

    /// Replace all in-memory state with what the backend holds now.
    ///
    /// All three slots are read before anything is replaced, so a failed
    /// reload keeps the previous state. Unlike [`Self::open_with`] this does
    /// not purge or save, and [`Self::purged_at_open`] keeps its value;
    /// expired discovered APIs stay in memory but are never returned.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        self.load()
    }

    /// Write all three collections to the backend.
    ///
    /// Every slot is attempted even if an earlier one fails.
    ///
    /// # Errors
    /// Returns the first persistence error, regardless of [`SavePolicy`].
    pub fn save(&self) -> Result<()> {
        let blobs = [
            (
                Slot::DiscoveredApiCache,
                serde_json::to_string(&self.discovered_api_cache)?,
            ),
            (Slot::SavedProfiles, serde_json::to_string(&self.saved_profiles)?),
            (Slot::SavedTokens, serde_json::to_string(&self.saved_tokens)?),
        ];

        let mut first_error: Option<HistoryError> = None;
        for (slot, blob) in &blobs {
            if let Err(e) = self.backend.store(*slot, blob) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Save after a mutation, applying the save policy.
    fn persist(&self) -> Result<()> {
        match self.save() {
            Ok(()) => Ok(()),
            Err(e) => match self.options.save_policy {
                SavePolicy::Propagate => Err(e),
                SavePolicy::LogAndContinue => {
                    tracing::warn!(error = %e, "Failed to persist history, keeping in-memory state");
                    Ok(())
                }
            },
        }
    }

    fn purge_cache(&mut self) -> usize {
        let before = self.discovered_api_cache.len();
        self.discovered_api_cache.purge_at(self.clock.now());
        before - self.discovered_api_cache.len()
    }

    // =========================================================================
    // Discovered APIs
    // =========================================================================

    /// Cached discovered API for a provider, unless missing or expired.
    #[must_use]
    pub fn get_cached_discovered_api(&self, sanitized_base_uri: &str) -> Option<&DiscoveredApi> {
        self.discovered_api_cache
            .get_at(&sanitize_base_uri(sanitized_base_uri), self.clock.now())
    }

    /// Cache a discovered API for one TTL.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn cache_discovered_api(
        &mut self,
        sanitized_base_uri: &str,
        discovered_api: DiscoveredApi,
    ) -> Result<()> {
        let uri = sanitize_base_uri(sanitized_base_uri);
        tracing::debug!(uri = %uri, "Caching discovered API");
        self.discovered_api_cache
            .put_at(uri, discovered_api, self.clock.now());
        self.persist()
    }

    /// Forget the discovered API of a provider.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn remove_discovered_api(&mut self, sanitized_base_uri: &str) -> Result<()> {
        let uri = sanitize_base_uri(sanitized_base_uri);
        if self.discovered_api_cache.remove(&uri).is_some() {
            tracing::debug!(uri = %uri, "Removed discovered API");
        }
        self.persist()
    }

    /// Purge expired discovered APIs now and persist.
    ///
    /// Returns how many entries were dropped.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn purge_expired(&mut self) -> Result<usize> {
        let purged = self.purge_cache();
        tracing::debug!(purged, "Purged expired discovered APIs");
        self.persist()?;
        Ok(purged)
    }

    // =========================================================================
    // Saved tokens
    // =========================================================================

    /// Access token saved for a provider.
    #[must_use]
    pub fn get_cached_access_token(&self, sanitized_base_uri: &str) -> Option<&str> {
        self.get_saved_token(sanitized_base_uri)
            .map(|saved| saved.access_token.as_str())
    }

    /// Saved token entry for a provider.
    #[must_use]
    pub fn get_saved_token(&self, sanitized_base_uri: &str) -> Option<&SavedToken> {
        let uri = sanitize_base_uri(sanitized_base_uri);
        self.saved_tokens
            .iter()
            .find(|saved| saved.instance.has_base_uri(&uri))
    }

    /// Save `access_token` for `instance`, replacing any token it had.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn cache_access_token(
        &mut self,
        instance: Instance,
        access_token: impl Into<String>,
    ) -> Result<()> {
        let uri = instance.sanitized_base_uri();
        let replaced = self.drop_tokens(&uri);
        tracing::debug!(uri = %uri, replaced, "Caching access token");
        self.saved_tokens.push(SavedToken::new(instance, access_token));
        self.persist()
    }

    /// Remove every token saved for a provider.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn remove_access_tokens(&mut self, sanitized_base_uri: &str) -> Result<()> {
        let uri = sanitize_base_uri(sanitized_base_uri);
        let removed = self.drop_tokens(&uri);
        tracing::debug!(uri = %uri, removed, "Removed access tokens");
        self.persist()
    }

    /// Read-only view of all saved tokens.
    #[must_use]
    pub fn get_saved_token_list(&self) -> &[SavedToken] {
        &self.saved_tokens
    }

    fn drop_tokens(&mut self, uri: &str) -> usize {
        let before = self.saved_tokens.len();
        self.saved_tokens
            .retain(|saved| !saved.instance.has_base_uri(uri));
        before - self.saved_tokens.len()
    }

    // =========================================================================
    // Saved profiles
    // =========================================================================

    /// Read-only view of all saved profiles, in insertion order.
    #[must_use]
    pub fn get_saved_profile_list(&self) -> &[SavedProfile] {
        &self.saved_profiles
    }

    /// Remember a profile. Duplicates are kept.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn cache_saved_profile(&mut self, saved_profile: SavedProfile) -> Result<()> {
        tracing::debug!(
            uri = %saved_profile.instance.sanitized_base_uri(),
            profile_id = %saved_profile.profile.profile_id,
            "Caching saved profile"
        );
        self.saved_profiles.push(saved_profile);
        self.persist()
    }

    /// First saved profile matching provider and profile id.
    #[must_use]
    pub fn get_cached_saved_profile(
        &self,
        sanitized_base_uri: &str,
        profile_id: &str,
    ) -> Option<&SavedProfile> {
        let uri = sanitize_base_uri(sanitized_base_uri);
        self.saved_profiles
            .iter()
            .find(|saved| saved.matches(&uri, profile_id))
    }

    /// Remove the first saved profile with the same provider and profile id.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn remove_saved_profile(&mut self, saved_profile: &SavedProfile) -> Result<()> {
        if let Some(index) = self
            .saved_profiles
            .iter()
            .position(|saved| saved.same_identity(saved_profile))
        {
            self.saved_profiles.remove(index);
            tracing::debug!(
                profile_id = %saved_profile.profile.profile_id,
                "Removed saved profile"
            );
        }
        self.persist()
    }

    /// Remove every saved profile of a provider.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn remove_saved_profiles_for_instance(&mut self, sanitized_base_uri: &str) -> Result<()> {
        let uri = sanitize_base_uri(sanitized_base_uri);
        let removed = self.drop_profiles(&uri);
        tracing::debug!(uri = %uri, removed, "Removed saved profiles");
        self.persist()
    }

    fn drop_profiles(&mut self, uri: &str) -> usize {
        let before = self.saved_profiles.len();
        self.saved_profiles
            .retain(|saved| !saved.instance.has_base_uri(uri));
        before - self.saved_profiles.len()
    }

    // =========================================================================
    // Whole-provider and inspection helpers
    // =========================================================================

    /// Forget everything known about one provider, persisting once.
    ///
    /// # Errors
    /// Returns an error if persisting fails under [`SavePolicy::Propagate`].
    pub fn forget_instance(&mut self, sanitized_base_uri: &str) -> Result<()> {
        let uri = sanitize_base_uri(sanitized_base_uri);
        let tokens = self.drop_tokens(&uri);
        let profiles = self.drop_profiles(&uri);
        let api = self.discovered_api_cache.remove(&uri).is_some();
        tracing::info!(uri = %uri, tokens, profiles, api, "Forgot provider");
        self.persist()
    }

    /// Owned copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> HistorySnapshot {
        let now = self.clock.now();
        let discovered_apis = self
            .discovered_api_cache
            .valid_entries_at(now)
            .into_iter()
            .map(|(uri, entry)| DiscoveredApiRecord {
                sanitized_base_uri: uri.to_string(),
                api: entry.value.clone(),
                expires_at: entry.expires_at,
            })
            .collect();

        HistorySnapshot {
            taken_at: now,
            discovered_apis,
            saved_tokens: self.saved_tokens.clone(),
            saved_profiles: self.saved_profiles.clone(),
        }
    }

    /// How many expired discovered APIs were dropped while opening.
    #[must_use]
    pub const fn purged_at_open(&self) -> usize {
        self.purged_at_open
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn options(&self) -> &HistoryOptions {
        &self.options
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::models::Profile;
    use crate::storage::backend::MemoryBackend;
    use crate::test_utils::{
        make_test_discovered_api, make_test_instance, make_test_saved_profile, test_clock,
    };
    use chrono::TimeDelta;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tracing_test::traced_test;

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

    fn open_fresh() -> (HistoryStore<MemoryBackend>, MemoryBackend, ManualClock) {
        let backend = MemoryBackend::new();
        let clock = test_clock();
        (open(&backend, &clock), backend, clock)
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    #[traced_test]
    #[test]
    fn first_run_starts_empty_and_saves() {
        let (store, backend, _) = open_fresh();

        assert!(store.get_saved_profile_list().is_empty());
        assert!(store.get_saved_token_list().is_empty());
        assert!(store.snapshot().discovered_apis.is_empty());
        for slot in Slot::ALL {
            assert!(backend.blob(slot).is_some(), "{slot} not saved at startup");
        }
        assert!(logs_contain("No saved profiles found."));
        assert!(logs_contain("No saved tokens found."));
        assert!(logs_contain("No discovered API cache found."));
    }

    #[test]
    fn startup_purges_expired_entries_and_persists() {
        let (mut store, backend, clock) = open_fresh();
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        clock.advance(TimeDelta::days(20));
        store
            .cache_discovered_api(URI_B, make_test_discovered_api(URI_B))
            .unwrap();
        drop(store);

        clock.advance(TimeDelta::days(15));
        let store = open(&backend, &clock);

        assert!(store.get_cached_discovered_api(URI_A).is_none());
        assert!(store.get_cached_discovered_api(URI_B).is_some());
        assert_eq!(store.purged_at_open(), 1);

        let persisted: TtlCache<DiscoveredApi> =
            serde_json::from_str(&backend.blob(Slot::DiscoveredApiCache).unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert!(persisted.expires_at(URI_A).is_none());
    }

    #[traced_test]
    #[test]
    fn corrupt_slot_loads_as_empty() {
        let backend = MemoryBackend::new()
            .with_blob(Slot::SavedTokens, "{not json")
            .with_blob(Slot::SavedProfiles, "[]");
        let store = open(&backend, &test_clock());

        assert!(store.get_saved_token_list().is_empty());
        assert!(logs_contain("Ignoring unreadable history slot"));
        // The startup save overwrites the corrupt blob
        assert_eq!(backend.blob(Slot::SavedTokens).as_deref(), Some("[]"));
    }

    #[test]
    fn reload_replaces_state_from_backend() {
        let (mut store, backend, clock) = open_fresh();
        let mut other = open(&backend, &clock);
        other
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();

        assert!(store.get_cached_access_token(URI_A).is_none());
        store.reload().unwrap();
        assert_eq!(store.get_cached_access_token(URI_A), Some("tok"));
    }

    /// Backend whose reads of one slot can be switched to fail.
    struct FlakyLoad {
        inner: MemoryBackend,
        failing: Slot,
        armed: AtomicBool,
    }

    impl PersistencePort for FlakyLoad {
        fn load(&self, slot: Slot) -> Result<Option<String>> {
            if slot == self.failing && self.armed.load(Ordering::SeqCst) {
                return Err(HistoryError::persistence(
                    slot,
                    std::io::Error::other("slot unreadable"),
                ));
            }
            self.inner.load(slot)
        }

        fn store(&self, slot: Slot, blob: &str) -> Result<()> {
            self.inner.store(slot, blob)
        }
    }

    #[test]
    fn failed_reload_keeps_previous_state() {
        let inner = MemoryBackend::new();
        let clock = test_clock();
        let mut store = HistoryStore::open_with(
            FlakyLoad {
                inner: inner.clone(),
                failing: Slot::SavedTokens,
                armed: AtomicBool::new(false),
            },
            HistoryOptions::default(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_A, "internet"))
            .unwrap();
        store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();

        // Profiles change underneath, then the token slot becomes unreadable
        inner.store(Slot::SavedProfiles, "[]").unwrap();
        store.backend.armed.store(true, Ordering::SeqCst);

        let err = store.reload().unwrap_err();
        assert_eq!(err.slot(), Some(Slot::SavedTokens));
        assert_eq!(store.get_saved_profile_list().len(), 1);
        assert_eq!(store.get_saved_token_list().len(), 1);
        assert_eq!(store.get_cached_access_token(URI_A), Some("tok"));

        store.backend.armed.store(false, Ordering::SeqCst);
        store.reload().unwrap();
        assert!(store.get_saved_profile_list().is_empty());
        assert_eq!(store.get_saved_token_list().len(), 1);
    }

    #[test]
    fn reload_does_not_purge_but_hides_expired() {
        let (mut store, backend, clock) = open_fresh();
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        let writes = backend.write_count();

        clock.advance(TimeDelta::days(31));
        store.reload().unwrap();

        assert!(store.get_cached_discovered_api(URI_A).is_none());
        assert_eq!(store.purged_at_open(), 0);
        assert_eq!(backend.write_count(), writes);
        let persisted: TtlCache<DiscoveredApi> =
            serde_json::from_str(&backend.blob(Slot::DiscoveredApiCache).unwrap()).unwrap();
        assert!(persisted.expires_at(URI_A).is_some());
    }

    // -------------------------------------------------------------------------
    // Discovered APIs
    // -------------------------------------------------------------------------

    #[test]
    fn discovered_api_expires_after_thirty_days() {
        let (mut store, _, clock) = open_fresh();
        let api = make_test_discovered_api("https://vpn.example.org/");
        store
            .cache_discovered_api("https://vpn.example.org/", api.clone())
            .unwrap();

        assert_eq!(
            store.get_cached_discovered_api("https://vpn.example.org/"),
            Some(&api)
        );

        clock.advance(TimeDelta::days(31));
        assert!(store
            .get_cached_discovered_api("https://vpn.example.org/")
            .is_none());
    }

    #[test]
    fn custom_ttl_applies_to_new_entries() {
        let backend = MemoryBackend::new();
        let clock = test_clock();
        let options =
            HistoryOptions::default().with_discovered_api_ttl(Duration::from_secs(3600));
        let mut store =
            HistoryStore::open_with(backend, options, Arc::new(clock.clone())).unwrap();

        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        clock.advance(TimeDelta::minutes(61));

        assert!(store.get_cached_discovered_api(URI_A).is_none());
    }

    #[test]
    fn remove_discovered_api_and_purge() {
        let (mut store, _, clock) = open_fresh();
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        store
            .cache_discovered_api(URI_B, make_test_discovered_api(URI_B))
            .unwrap();

        store.remove_discovered_api(URI_A).unwrap();
        store.remove_discovered_api(URI_A).unwrap();
        assert!(store.get_cached_discovered_api(URI_A).is_none());

        clock.advance(TimeDelta::days(30));
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    // -------------------------------------------------------------------------
    // Tokens
    // -------------------------------------------------------------------------

    #[test]
    fn caching_token_twice_keeps_only_latest() {
        let (mut store, _, _) = open_fresh();
        store
            .cache_access_token(make_test_instance(URI_A), "tok1")
            .unwrap();
        store
            .cache_access_token(make_test_instance(URI_A), "tok2")
            .unwrap();

        assert_eq!(store.get_cached_access_token(URI_A), Some("tok2"));
        let for_a = store
            .get_saved_token_list()
            .iter()
            .filter(|t| t.instance.has_base_uri(URI_A))
            .count();
        assert_eq!(for_a, 1);
    }

    #[test]
    fn token_uniqueness_ignores_trailing_slash() {
        let (mut store, _, _) = open_fresh();
        store
            .cache_access_token(make_test_instance("https://vpn.example.org/"), "tok1")
            .unwrap();
        store
            .cache_access_token(make_test_instance("https://vpn.example.org"), "tok2")
            .unwrap();

        assert_eq!(store.get_saved_token_list().len(), 1);
        assert_eq!(
            store.get_cached_access_token("https://vpn.example.org/"),
            Some("tok2")
        );
    }

    #[test]
    fn token_uniqueness_over_many_providers() {
        let (mut store, _, _) = open_fresh();
        let uris = [URI_A, URI_B, URI_A, "https://third.example.com", URI_B, URI_A];
        for (i, uri) in uris.iter().enumerate() {
            store
                .cache_access_token(make_test_instance(uri), format!("tok{i}"))
                .unwrap();
        }

        assert_eq!(store.get_saved_token_list().len(), 3);
        assert_eq!(store.get_cached_access_token(URI_A), Some("tok5"));
        assert_eq!(store.get_cached_access_token(URI_B), Some("tok4"));
    }

    #[test]
    fn remove_access_tokens_is_idempotent() {
        let (mut store, _, _) = open_fresh();
        store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();
        store
            .cache_access_token(make_test_instance(URI_B), "other")
            .unwrap();

        store.remove_access_tokens(URI_A).unwrap();
        let after_first = store.get_saved_token_list().to_vec();
        store.remove_access_tokens(URI_A).unwrap();

        assert_eq!(store.get_saved_token_list(), after_first.as_slice());
        assert!(store.get_saved_token(URI_A).is_none());
        assert!(store.get_saved_token(URI_B).is_some());
    }

    // -------------------------------------------------------------------------
    // Profiles
    // -------------------------------------------------------------------------

    #[test]
    fn saved_profiles_are_not_deduplicated() {
        let (mut store, _, _) = open_fresh();
        let first = make_test_saved_profile(URI_A, "profile1");
        let mut second = first.clone();
        second.profile.display_name = "Second copy".to_string();

        store.cache_saved_profile(first.clone()).unwrap();
        store.cache_saved_profile(second).unwrap();

        assert_eq!(store.get_saved_profile_list().len(), 2);
        assert_eq!(
            store.get_cached_saved_profile(URI_A, "profile1"),
            Some(&first)
        );
    }

    #[test]
    fn remove_saved_profile_removes_first_match_only() {
        let (mut store, _, _) = open_fresh();
        let profile = make_test_saved_profile(URI_A, "profile1");
        store.cache_saved_profile(profile.clone()).unwrap();
        store.cache_saved_profile(profile.clone()).unwrap();

        store.remove_saved_profile(&profile).unwrap();
        assert_eq!(store.get_saved_profile_list().len(), 1);

        store.remove_saved_profile(&profile).unwrap();
        store.remove_saved_profile(&profile).unwrap();
        assert!(store.get_saved_profile_list().is_empty());
    }

    #[test]
    fn remove_profiles_for_instance() {
        let (mut store, _, _) = open_fresh();
        store
            .cache_saved_profile(make_test_saved_profile(URI_A, "internet"))
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_A, "office"))
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_B, "internet"))
            .unwrap();

        store.remove_saved_profiles_for_instance(URI_A).unwrap();

        let remaining = store.get_saved_profile_list();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].instance.has_base_uri(URI_B));
    }

    #[test]
    fn profile_lookup_needs_both_keys() {
        let (mut store, _, _) = open_fresh();
        let saved = SavedProfile::new(
            make_test_instance(URI_A),
            Profile::new("Office", "office"),
        );
        store.cache_saved_profile(saved).unwrap();

        assert!(store.get_cached_saved_profile(URI_A, "office").is_some());
        assert!(store.get_cached_saved_profile(URI_B, "office").is_none());
        assert!(store.get_cached_saved_profile(URI_A, "internet").is_none());
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    #[test]
    fn every_mutation_persists_all_slots() {
        let (mut store, backend, _) = open_fresh();
        let writes = backend.write_count();

        store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();

        assert_eq!(backend.write_count(), writes + 3);
    }

    #[test]
    fn reopen_yields_same_collections() {
        let (mut store, backend, clock) = open_fresh();
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_A, "internet"))
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_B, "office"))
            .unwrap();
        store.remove_saved_profiles_for_instance(URI_B).unwrap();

        let before = store.snapshot();
        let reopened = open(&backend, &clock);

        assert_eq!(reopened.snapshot(), before);
    }

    #[traced_test]
    #[test]
    fn log_policy_swallows_save_failures() {
        let (mut store, backend, _) = open_fresh();
        backend.set_fail_writes(true);

        store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();

        assert_eq!(store.get_cached_access_token(URI_A), Some("tok"));
        assert!(logs_contain("Failed to persist history"));
    }

    #[test]
    fn propagate_policy_surfaces_save_failures() {
        let backend = MemoryBackend::new();
        let clock = test_clock();
        let options = HistoryOptions::default().with_save_policy(SavePolicy::Propagate);
        let mut store =
            HistoryStore::open_with(backend.clone(), options, Arc::new(clock)).unwrap();
        backend.set_fail_writes(true);

        let err = store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap_err();
        assert!(err.slot().is_some());
        // In-memory change stands and can be saved later
        assert_eq!(store.get_cached_access_token(URI_A), Some("tok"));

        backend.set_fail_writes(false);
        store.save().unwrap();
        assert!(backend.blob(Slot::SavedTokens).unwrap().contains("tok"));
    }

    #[test]
    fn propagate_policy_fails_open_when_backend_is_read_only() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        let options = HistoryOptions::default().with_save_policy(SavePolicy::Propagate);

        let result = HistoryStore::open_with(backend, options, Arc::new(test_clock()));
        assert!(result.is_err());
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    #[test]
    fn forget_instance_clears_all_three_collections() {
        let (mut store, backend, _) = open_fresh();
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        store
            .cache_access_token(make_test_instance(URI_A), "tok")
            .unwrap();
        store
            .cache_saved_profile(make_test_saved_profile(URI_A, "internet"))
            .unwrap();
        store
            .cache_access_token(make_test_instance(URI_B), "keep")
            .unwrap();
        let writes = backend.write_count();

        store.forget_instance(URI_A).unwrap();

        assert!(store.get_cached_discovered_api(URI_A).is_none());
        assert!(store.get_saved_token(URI_A).is_none());
        assert!(store.get_saved_profile_list().is_empty());
        assert_eq!(store.get_cached_access_token(URI_B), Some("keep"));
        assert_eq!(backend.write_count(), writes + 3);
    }

    #[test]
    fn snapshot_hides_expired_apis() {
        let (mut store, _, clock) = open_fresh();
        store
            .cache_discovered_api(URI_A, make_test_discovered_api(URI_A))
            .unwrap();
        clock.advance(TimeDelta::days(29));
        store
            .cache_discovered_api(URI_B, make_test_discovered_api(URI_B))
            .unwrap();
        clock.advance(TimeDelta::days(2));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.taken_at, clock.now());
        assert_eq!(snapshot.discovered_apis.len(), 1);
        assert_eq!(snapshot.discovered_apis[0].sanitized_base_uri, URI_B);
    }

    #[test]
    fn save_policy_parsing() {
        assert_eq!(SavePolicy::from_arg("LOG"), Some(SavePolicy::LogAndContinue));
        assert_eq!(SavePolicy::from_arg("propagate"), Some(SavePolicy::Propagate));
        assert_eq!(SavePolicy::from_arg("sometimes"), None);
        assert_eq!(SavePolicy::Propagate.as_str(), "propagate");
    }
}
