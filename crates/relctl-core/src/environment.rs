//! Signing environment selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Which signing authority a request targets.
///
/// Staging exists to exercise a non-production authority: invalid
/// signatures there are logged instead of failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SigningEnvironment {
    #[default]
    #[serde(rename = "prod", alias = "production")]
    Production,
    #[serde(rename = "stg", alias = "staging")]
    Staging,
}

impl SigningEnvironment {
    /// Short name used in bus topics
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningEnvironment::Production => "prod",
            SigningEnvironment::Staging => "stg",
        }
    }

    pub fn is_staging(&self) -> bool {
        matches!(self, SigningEnvironment::Staging)
    }
}

impl fmt::Display for SigningEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningEnvironment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(SigningEnvironment::Production),
            "stg" | "staging" => Ok(SigningEnvironment::Staging),
            other => Err(Error::configuration(format!(
                "unknown signing environment '{}': expected prod or stg",
                other
            ))),
        }
    }
}
