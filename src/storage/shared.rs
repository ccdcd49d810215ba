//! Thread-safe handle to a [`HistoryStore`].
//!
//! Every mutation of the store is an in-memory change followed by a full
//! persist. Two callers interleaving those steps could persist a stale
//! tuple, so the handle runs each closure under one coarse lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::models::{SavedProfile, SavedToken};
use crate::storage::backend::PersistencePort;
use crate::storage::history::{HistorySnapshot, HistoryStore};

/// Cloneable, lock-guarded history store.
pub struct SharedHistoryStore<B> {
    inner: Arc<Mutex<HistoryStore<B>>>,
}

impl<B> Clone for SharedHistoryStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: PersistencePort> SharedHistoryStore<B> {
    #[must_use]
    pub fn new(store: HistoryStore<B>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// A panic in an earlier closure does not lock everyone out; the store
    /// state it left behind is used as-is.
    pub fn with<R>(&self, f: impl FnOnce(&mut HistoryStore<B>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Owned copy of the saved profiles.
    #[must_use]
    pub fn saved_profiles(&self) -> Vec<SavedProfile> {
        self.lock().get_saved_profile_list().to_vec()
    }

    /// Owned copy of the saved tokens.
    #[must_use]
    pub fn saved_tokens(&self) -> Vec<SavedToken> {
        self.lock().get_saved_token_list().to_vec()
    }

    #[must_use]
    pub fn snapshot(&self) -> HistorySnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryStore<B>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
