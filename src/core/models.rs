//! Data types shared between the history store and its callers.
//!
//! Provider identities, profiles and discovered APIs are produced by the
//! discovery and authorization layers of the embedding application; this
//! crate only stores them. All types serialize to camelCase JSON.

use serde::{Deserialize, Serialize};

/// Normalize a provider base URI into the key used across all collections.
///
/// Surrounding whitespace and trailing `/` characters are removed, so
/// `https://vpn.example.org/` and `https://vpn.example.org` are the same
/// provider.
#[must_use]
pub fn sanitize_base_uri(uri: &str) -> String {
    uri.trim().trim_end_matches('/').to_string()
}

/// How a provider hands out access tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationType {
    /// Each provider runs its own authorization server.
    #[default]
    Local,
    /// One token is valid for a federation of providers.
    Distributed,
}

/// A VPN provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Base URI as published by discovery.
    pub base_uri: String,
    /// Name shown to users.
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub authorization_type: AuthorizationType,
    /// Added by hand rather than found through discovery.
    #[serde(default)]
    pub is_custom: bool,
}

impl Instance {
    /// Create a discovered, locally-authorized instance.
    #[must_use]
    pub fn new(base_uri: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            display_name: display_name.into(),
            logo_uri: None,
            authorization_type: AuthorizationType::Local,
            is_custom: false,
        }
    }

    /// Lookup key for this provider.
    #[must_use]
    pub fn sanitized_base_uri(&self) -> String {
        sanitize_base_uri(&self.base_uri)
    }

    /// Whether this instance is the provider identified by `sanitized_base_uri`.
    #[must_use]
    pub fn has_base_uri(&self, sanitized_base_uri: &str) -> bool {
        self.base_uri.trim().trim_end_matches('/') == sanitized_base_uri
    }
}

/// A connection profile offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    /// Unique within its provider.
    pub profile_id: String,
    #[serde(default)]
    pub two_factor: bool,
}

impl Profile {
    #[must_use]
    pub fn new(display_name: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            profile_id: profile_id.into(),
            two_factor: false,
        }
    }
}

/// An access token remembered for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedToken {
    pub instance: Instance,
    pub access_token: String,
}

impl SavedToken {
    #[must_use]
    pub fn new(instance: Instance, access_token: impl Into<String>) -> Self {
        Self {
            instance,
            access_token: access_token.into(),
        }
    }
}

/// A profile the user connected with before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProfile {
    pub instance: Instance,
    pub profile: Profile,
}

impl SavedProfile {
    #[must_use]
    pub const fn new(instance: Instance, profile: Profile) -> Self {
        Self { instance, profile }
    }

    /// Identity match on (provider, profile id).
    #[must_use]
    pub fn matches(&self, sanitized_base_uri: &str, profile_id: &str) -> bool {
        self.instance.has_base_uri(sanitized_base_uri) && self.profile.profile_id == profile_id
    }

    /// Whether `other` refers to the same provider and profile.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.matches(&other.instance.sanitized_base_uri(), &other.profile.profile_id)
    }
}

/// Endpoints found by probing a provider's `info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredApi {
    /// Discovery document version.
    pub version: u32,
    pub api_base_uri: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}
