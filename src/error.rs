//! Construction-time errors.
//!
//! The command interface itself is total: every command maps to a state
//! transition and stale or unknown references degrade to silent no-ops.
//! Errors exist only at the edges, where a host constructs inputs or
//! encodes state.

use thiserror::Error;

/// Invalid queue name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("queue name `{raw}` is invalid: {reason}")]
pub struct InvalidName {
    pub raw: String,
    pub reason: String,
}

/// Canonical encoding of a state or snapshot failed.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("canonical encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
