//! Configuration loading

mod loader;
mod types;

pub use loader::{RelctlConfig, CONFIG_FILE_NAMES};
pub use types::{
    BusConfig, BusKind, CommitStoreConfig, RegistryConfig, RelctlConfigFile, SigningConfig,
    StorageConfig, DEFAULT_PRIORITY, DEFAULT_REQUEST_TIMEOUT_SECS,
};
