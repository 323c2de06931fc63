//! Error types for encoding, handle allocation, and fixture loading.

use thiserror::Error;

/// Errors that can escape the inspection core.
///
/// Per-value reflection problems never show up here: the encoder degrades them
/// to an `instance` node. Anything returned from [`crate::encode`] is a
/// registry-level failure and ends the owning session.
#[derive(Error, Debug)]
pub enum InspectError {
    /// The handle counter has no sequence numbers left.
    #[error("identity handle counter exhausted")]
    IdentityExhausted,

    /// A wire payload (or fixture document) was not valid JSON for its shape.
    #[error("wire payload parse error: {0}")]
    WireParse(#[from] serde_json::Error),

    /// A fixture document used an unknown directive or a dangling reference.
    /// `path` is a dotted location inside the document (`$` is the root).
    #[error("fixture error at {path}: {message}")]
    Fixture { path: String, message: String },

    /// Handle text that is not a base-36 sequence number.
    #[error("malformed identity handle: {0:?}")]
    MalformedHandle(String),
}

/// Why an object refused to be introspected.
///
/// Local to the encoder: it is swallowed into an `instance` node and never
/// returned to callers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionError {
    /// A proxy whose target has been revoked.
    #[error("proxy has been revoked")]
    Revoked,

    /// The object is mutably borrowed somewhere else right now.
    #[error("object is locked for mutation")]
    Busy,
}

impl ReflectionError {
    /// Type tag reported in place of the unreadable object.
    pub fn fallback_tag(self) -> &'static str {
        match self {
            Self::Revoked => "Proxy",
            Self::Busy => "Object",
        }
    }
}

/// Convenience alias used throughout inspect-core.
pub type Result<T> = std::result::Result<T, InspectError>;
