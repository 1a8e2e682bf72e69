//! Common test utilities for relctl-sign
//!
//! Provides shared test infrastructure including:
//! - A fake signing authority answering requests on an in-memory bus
//! - Recording fakes for object storage, the commit store, and gpg
//! - Build directory fixtures

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
