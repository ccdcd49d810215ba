//! Storage for configuration, the discovered-API cache, saved tokens and
//! saved profiles.

pub mod backend;
pub mod cache;
pub mod config;
pub mod history;
pub mod paths;
pub mod shared;

pub use backend::{JsonFileBackend, MemoryBackend, PersistencePort, Slot};
pub use cache::{CacheEntry, TtlCache};
pub use config::{
    Config, ConfigSource, ConfigSources, ENV_CONFIG, ENV_DATA_DIR, ENV_SAVE_FAILURE,
    ENV_TTL_DAYS, ResolvedConfig,
};
pub use history::{
    DEFAULT_DISCOVERED_API_TTL, DiscoveredApiRecord, HistoryOptions, HistorySnapshot,
    HistoryStore, SavePolicy,
};
pub use paths::AppPaths;
pub use shared::SharedHistoryStore;
