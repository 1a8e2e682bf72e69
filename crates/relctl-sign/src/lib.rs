//! Signing for relctl
//!
//! Submits a build's commit or images to an external signing authority over
//! a message bus, waits for the correlated reply, and verifies the returned
//! signatures before anything is treated as authoritative.
//!
//! The authority, the bus transport, object storage, and the commit store are
//! external. They are reached through the [`MessageBus`], [`ObjectStore`],
//! [`CommitStore`], and [`DetachedVerifier`] traits.

pub mod bus;
pub mod commit_store;
pub mod protocol;
pub mod reexport;
pub mod storage;
pub mod verify;
pub mod workflow;

pub use bus::{
    correlation_id, BusMessage, InMemoryBus, MessageBus, SpoolBus, Subscription, CORRELATION_KEY,
};
pub use commit_store::{CommitSignature, CommitStore, OstreeCli};
pub use protocol::{
    parse_extra_keys, ArtifactChecksum, RequestPayload, RequestType, SigningProtocol,
    SigningRequest, SigningResponse,
};
pub use reexport::ArtifactReexporter;
pub use storage::{ObjectStore, S3ObjectStore};
pub use verify::{
    accept, Accepted, CommitVerifier, DetachedVerifier, GpgVerifier, ImageSignatureVerifier,
    ImageVerification, SignedArtifact, VerificationResult, VerifiedCommit,
};
pub use workflow::{
    CommitSignReport, CommitSigner, ImageSignReport, ImageSigner, SigningContext,
};
