//! Test utilities for vpn-history.
//!
//! Provides shared helpers and test data factories for use across all test
//! modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vpn_history::test_utils::*;
//!
//! let instance = make_test_instance("https://vpn.example.org");
//! let clock = test_clock();
//! let dir = TestDir::new();
//! dir.create_file("config.toml", "[history]\ndiscovered_api_ttl_days = 7");
//! ```

use chrono::{TimeZone, Utc};
use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};

use crate::core::clock::ManualClock;
use crate::core::models::{DiscoveredApi, Instance, Profile, SavedProfile, sanitize_base_uri};

// =============================================================================
// Test Data Factories
// =============================================================================

/// Create a test `Instance` for the given base URI.
///
/// The display name is derived from the host so different URIs are easy to
/// tell apart in assertion output.
///
/// # Examples
///
/// ```rust,ignore
/// use vpn_history::test_utils::make_test_instance;
///
/// let instance = make_test_instance("https://vpn.example.org/");
/// assert_eq!(instance.sanitized_base_uri(), "https://vpn.example.org");
/// ```
#[must_use]
pub fn make_test_instance(base_uri: &str) -> Instance {
    let host = sanitize_base_uri(base_uri)
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .to_string();
    let mut instance = Instance::new(base_uri, format!("Provider {host}"));
    instance.logo_uri = Some(format!("{}/logo.png", sanitize_base_uri(base_uri)));
    instance
}

/// Create a test `Profile` with the given id.
#[must_use]
pub fn make_test_profile(profile_id: &str) -> Profile {
    Profile::new(format!("Profile {profile_id}"), profile_id)
}

/// Create a test `SavedProfile` for the given provider and profile id.
#[must_use]
pub fn make_test_saved_profile(base_uri: &str, profile_id: &str) -> SavedProfile {
    SavedProfile::new(make_test_instance(base_uri), make_test_profile(profile_id))
}

/// Create a test `DiscoveredApi` with endpoints under the given base URI.
#[must_use]
pub fn make_test_discovered_api(base_uri: &str) -> DiscoveredApi {
    let base = sanitize_base_uri(base_uri);
    DiscoveredApi {
        version: 2,
        api_base_uri: format!("{base}/portal/api.php"),
        authorization_endpoint: format!("{base}/portal/_oauth/authorize"),
        token_endpoint: format!("{base}/portal/oauth.php/token"),
    }
}

/// A manual clock frozen at 2024-01-15 10:00:00 UTC.
#[must_use]
pub fn test_clock() -> ManualClock {
    ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
    )
}

// =============================================================================
// Temporary Directories
// =============================================================================

/// Isolated temporary directory that is removed on drop.
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file in the temporary directory with the given content.
    ///
    /// Creates parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    /// Read a file from the temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    /// Check if a file exists in the temporary directory.
    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }

    /// Get the full path to a file in the temporary directory.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
