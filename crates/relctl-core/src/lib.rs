//! # relctl-core
//!
//! Core library for relctl providing:
//! - The error taxonomy shared by publication and signing
//! - Architecture name normalization
//! - Build metadata records (`builds/<id>/<arch>/meta.json`)
//! - Configuration file parsing (`relctl.yaml`)
//! - Checksum and external tool helpers

pub mod arch;
pub mod checksum;
pub mod config;
pub mod environment;
pub mod error;
pub mod meta;
pub mod process;

pub use config::RelctlConfig;
pub use environment::SigningEnvironment;
pub use error::{Error, Result};
pub use meta::{
    ArtifactEntry, BuildIndex, BuildMetadataStore, BuildRecord, PublicationRecord,
    PublicationRecords,
};
