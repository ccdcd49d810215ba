//! Generic in-memory TTL cache.
//!
//! Every entry carries its own absolute expiry, computed as
//! `insertion time + ttl`. An entry is valid while `now < expires_at`.
//!
//! # Features
//! - Pure value type: serializes to and restores from a snapshot verbatim
//! - Restoring does not re-stamp expiries, so a restored cache may hold
//!   expired entries until [`TtlCache::purge`] runs
//! - Reads never evict; eviction is the explicit `purge` step
//!
//! Every time-dependent method has an `_at` variant taking `now`, which is
//! what the history store calls with its injected clock.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A cached value and the moment it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Whether the entry may still be returned at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// String-keyed cache with a single TTL applied to every insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlCache<T> {
    ttl_seconds: u64,
    #[serde(default = "HashMap::new")]
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T> TtlCache<T> {
    /// Create an empty cache.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_seconds: ttl.as_secs(),
            entries: HashMap::new(),
        }
    }

    /// Rebuild a cache from a snapshot, keeping each entry's expiry.
    #[must_use]
    pub const fn from_entries(ttl: Duration, entries: HashMap<String, CacheEntry<T>>) -> Self {
        Self {
            ttl_seconds: ttl.as_secs(),
            entries,
        }
    }

    /// TTL applied to new entries.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Change the TTL for future inserts. Existing expiries are untouched.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl_seconds = ttl.as_secs();
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let ttl = i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Look up a value that has not expired yet.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&T> {
        self.get_at(key, Utc::now())
    }

    /// Look up a value that is still valid at `now`.
    #[must_use]
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<&T> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_valid_at(now))
            .map(|entry| &entry.value)
    }

    /// Insert or overwrite `key`, expiring one TTL from now.
    pub fn put(&mut self, key: impl Into<String>, value: T) {
        self.put_at(key, value, Utc::now());
    }

    /// Insert or overwrite `key`, expiring one TTL after `now`.
    pub fn put_at(&mut self, key: impl Into<String>, value: T, now: DateTime<Utc>) {
        let expires_at = self.expiry_from(now);
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Drop `key`. Absent keys are fine.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Drop every entry that has expired by now.
    pub fn purge(&mut self) {
        self.purge_at(Utc::now());
    }

    /// Drop every entry with `expires_at <= now`.
    pub fn purge_at(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.is_valid_at(now));
    }

    /// Number of stored entries, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored expiry of `key`, whether or not it has passed.
    #[must_use]
    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    /// Entries still valid at `now`, sorted by key.
    #[must_use]
    pub fn valid_entries_at(&self, now: DateTime<Utc>) -> Vec<(&str, &CacheEntry<T>)> {
        let mut valid: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_valid_at(now))
            .map(|(key, entry)| (key.as_str(), entry))
            .collect();
        valid.sort_by(|a, b| a.0.cmp(b.0));
        valid
    }
}
