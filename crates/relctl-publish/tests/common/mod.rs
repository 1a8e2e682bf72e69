//! Common test utilities for relctl-publish
//!
//! Provides shared test infrastructure including:
//! - An in-memory container registry that records every call
//! - Build directory fixtures with real artifacts and checksums

pub mod fixtures;
pub mod mock_registry;

pub use fixtures::*;
pub use mock_registry::*;
