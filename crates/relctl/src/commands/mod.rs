//! CLI command implementations

pub mod push_manifest;
pub mod sign;
pub mod version;

use camino::{Utf8Path, Utf8PathBuf};
use relctl_core::RelctlConfig;

/// Pick a path from a flag or, failing that, from the config file.
///
/// Flag values stay relative to the current directory; config values are
/// relative to the config file.
pub fn flag_or_config_path(
    config: &RelctlConfig,
    flag: Option<&Utf8Path>,
    configured: Option<&Utf8Path>,
) -> Option<Utf8PathBuf> {
    match flag {
        Some(path) => Some(path.to_owned()),
        None => configured.map(|path| config.resolve(path)),
    }
}

/// Process exit code for a failed command.
///
/// The first relctl error in the context chain decides; anything else is 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<relctl_core::Error>())
        .map(|e| u8::try_from(e.exit_code()).unwrap_or(1))
        .unwrap_or(1)
}
