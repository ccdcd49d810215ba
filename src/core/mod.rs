//! Core data models, clock and logging.

pub mod clock;
pub mod credential_hash;
pub mod logging;
pub mod models;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential_hash::token_fingerprint;
pub use models::{
    AuthorizationType, DiscoveredApi, Instance, Profile, SavedProfile, SavedToken,
    sanitize_base_uri,
};
