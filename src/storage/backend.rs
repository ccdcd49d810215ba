//! Persistence port for the history store.
//!
//! The store serializes each of its three collections to a JSON blob and
//! hands it to a [`PersistencePort`] under a fixed [`Slot`]. Backends only
//! move strings; they never interpret them.
//!
//! Two backends ship with the crate:
//! - [`JsonFileBackend`]: one file per slot, written atomically
//! - [`MemoryBackend`]: shared in-memory map for embedding and tests

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{HistoryError, Result};

/// Logical storage location for one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    SavedProfiles,
    SavedTokens,
    DiscoveredApiCache,
}

impl Slot {
    /// Every slot, in the order the store writes them.
    pub const ALL: [Self; 3] = [
        Self::DiscoveredApiCache,
        Self::SavedProfiles,
        Self::SavedTokens,
    ];

    /// File name used by [`JsonFileBackend`].
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::SavedProfiles => "saved-profiles.json",
            Self::SavedTokens => "saved-tokens.json",
            Self::DiscoveredApiCache => "discovered-api-cache.json",
        }
    }

    /// Human-readable name for logs and errors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SavedProfiles => "saved profiles",
            Self::SavedTokens => "saved tokens",
            Self::DiscoveredApiCache => "discovered API cache",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Storage collaborator of the history store.
pub trait PersistencePort {
    /// Read the blob stored for `slot`.
    ///
    /// Returns `Ok(None)` when nothing was ever stored there.
    ///
    /// # Errors
    /// Returns an error if the slot exists but cannot be read.
    fn load(&self, slot: Slot) -> Result<Option<String>>;

    /// Replace the blob stored for `slot`.
    ///
    /// # Errors
    /// Returns an error if the blob cannot be written.
    fn store(&self, slot: Slot, blob: &str) -> Result<()>;
}

impl<P: PersistencePort + ?Sized> PersistencePort for Box<P> {
    fn load(&self, slot: Slot) -> Result<Option<String>> {
        (**self).load(slot)
    }

    fn store(&self, slot: Slot, blob: &str) -> Result<()> {
        (**self).store(slot, blob)
    }
}

impl<P: PersistencePort + ?Sized> PersistencePort for Arc<P> {
    fn load(&self, slot: Slot) -> Result<Option<String>> {
        (**self).load(slot)
    }

    fn store(&self, slot: Slot, blob: &str) -> Result<()> {
        (**self).store(slot, blob)
    }
}

// =============================================================================
// JSON files
// =============================================================================

/// Stores each slot as a JSON file inside one directory.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Use `dir` for all slot files. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the slot files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `slot`.
    #[must_use]
    pub fn slot_path(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.file_name())
    }
}

impl PersistencePort for JsonFileBackend {
    fn load(&self, slot: Slot) -> Result<Option<String>> {
        let path = self.slot_path(slot);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HistoryError::persistence(slot, e)),
        }
    }

    fn store(&self, slot: Slot, blob: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| HistoryError::persistence(slot, e))?;
        write_atomic(&self.slot_path(slot), blob.as_bytes())
            .map_err(|e| HistoryError::persistence(slot, e))
    }
}

/// Distinguishes temp files of concurrent writers within one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write bytes atomically using temp file + rename.
/// A reader sees either the previous content or the new content, never a mix.
/// The temp file is removed again if any step fails.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Temp file must live in the same directory for rename to be atomic
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("slot"),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = write_and_rename(&temp_path, path, content);
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(temp_path: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    {
        let mut file = std::fs::File::create(temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(temp_path, path)
}

// =============================================================================
// In memory
// =============================================================================

/// In-memory backend. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slots: Arc<Mutex<HashMap<Slot, String>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate `slot`.
    #[must_use]
    pub fn with_blob(self, slot: Slot, blob: impl Into<String>) -> Self {
        self.lock().insert(slot, blob.into());
        self
    }

    /// Current blob in `slot`.
    #[must_use]
    pub fn blob(&self, slot: Slot) -> Option<String> {
        self.lock().get(&slot).cloned()
    }

    /// Make every subsequent `store` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `store` calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Slot, String>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistencePort for MemoryBackend {
    fn load(&self, slot: Slot) -> Result<Option<String>> {
        Ok(self.blob(slot))
    }

    fn store(&self, slot: Slot, blob: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HistoryError::persistence(
                slot,
                std::io::Error::other("memory backend is refusing writes"),
            ));
        }
        self.lock().insert(slot, blob.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
