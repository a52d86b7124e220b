//! GitHub webhook authentication and release filtering

pub mod filter;
pub mod signature;

pub use filter::{EventFilter, FilterDecision, IgnoreReason, RejectReason, WebhookHeaders};
pub use signature::{SignatureCheck, SignatureVerifier};
