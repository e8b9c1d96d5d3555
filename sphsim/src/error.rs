//! Error types for the SPH particle core
//!
//! Every failure is local and synchronous: a bad handle, mismatched
//! bulk input, a broken snapshot buffer, or an invalid scenario value.
//! Stale neighbor lists are *not* an error, see
//! [`SphSystemData::is_neighbor_list_stale`](crate::SphSystemData::is_neighbor_list_stale).

use thiserror::Error;

/// Which arena a rejected handle was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Scalar,
    Vector,
    Particle,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandleKind::Scalar => "scalar channel",
            HandleKind::Vector => "vector channel",
            HandleKind::Particle => "particle",
        };
        f.write_str(s)
    }
}

/// Main error type for particle store, SPH and snapshot operations
#[derive(Error, Debug)]
pub enum SphError {
    /// Channel or particle index outside the valid range
    #[error("invalid {kind} handle {index} (have {len})")]
    InvalidHandle {
        kind: HandleKind,
        index: usize,
        len: usize,
    },

    /// Parallel sequences handed to a bulk operation differ in length
    #[error("size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Snapshot buffer is malformed, truncated or from another format version
    #[error("corrupt snapshot data: {0}")]
    CorruptData(String),

    /// Snapshot encoding failed
    #[error("snapshot encode error: {0}")]
    Encode(String),

    /// Write access requested to a derived channel
    #[error("channel {index} is derived and read-only")]
    ReadOnlyChannel { index: usize },

    /// Scenario parameter out of its valid domain
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Snapshot file I/O
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::error::DecodeError> for SphError {
    fn from(err: bincode::error::DecodeError) -> Self {
        SphError::CorruptData(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for SphError {
    fn from(err: bincode::error::EncodeError) -> Self {
        SphError::Encode(err.to_string())
    }
}

/// Result alias used across the crate
pub type SphResult<T> = Result<T, SphError>;
