//! Configuration file loading and parsing

use super::types::RelctlConfigFile;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::debug;

/// Configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["relctl.yaml", "relctl.yml"];

/// Loaded relctl configuration
#[derive(Debug, Clone)]
pub struct RelctlConfig {
    /// The parsed configuration
    pub config: RelctlConfigFile,

    /// Path to the configuration file, if one was found
    pub config_path: Option<Utf8PathBuf>,

    /// Directory relative paths are resolved against
    pub working_dir: Utf8PathBuf,
}

impl RelctlConfig {
    /// Load configuration from the specified path or search for it.
    ///
    /// An explicit path must exist. Without one, the current directory and
    /// its parents are searched, falling back to built-in defaults.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        if let Some(p) = path {
            let content = fs::read_to_string(p).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::configuration(format!("configuration file not found: {}", p))
                } else {
                    Error::Io(e)
                }
            })?;
            return Self::from_content(&content, p.to_owned());
        }

        let cwd = current_dir()?;
        match Self::find_config(&cwd)? {
            Some((config_path, content)) => Self::from_content(&content, config_path),
            None => {
                debug!("No relctl.yaml found, using defaults");
                Ok(Self {
                    config: RelctlConfigFile::default(),
                    config_path: None,
                    working_dir: cwd,
                })
            }
        }
    }

    /// Parse YAML content as if it were read from `config_path`
    pub fn from_content(content: &str, config_path: Utf8PathBuf) -> Result<Self> {
        let config: RelctlConfigFile = serde_yaml_ng::from_str(content)?;
        let working_dir = config_path
            .parent()
            .map(|p| p.to_owned())
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8PathBuf::from("."));

        debug!("Loaded configuration from {}", config_path);

        Ok(Self {
            config,
            config_path: Some(config_path),
            working_dir,
        })
    }

    /// Resolve a path read from the config file against its directory
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.working_dir.join(path)
        }
    }

    pub fn builds_dir(&self) -> Utf8PathBuf {
        self.resolve(&self.config.builds_dir)
    }

    /// Find configuration file in `start` or its parent directories
    fn find_config(start: &Utf8Path) -> Result<Option<(Utf8PathBuf, String)>> {
        let mut current = start;

        loop {
            for name in CONFIG_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    let content = fs::read_to_string(&path)?;
                    return Ok(Some((path, content)));
                }
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd)
        .map_err(|_| Error::configuration("Current directory path is not valid UTF-8"))
}
