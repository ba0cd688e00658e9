//! Recoverable failures raised by lookups and fallback stages.
//!
//! None of these ever reach a caller of the public lyric or fallback
//! operations: they are logged and turned into "no result" (or the next
//! stage of the chain).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    #[error("nothing found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The collaborator is not available in this environment.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("insufficient vocal confidence ({0:.2})")]
    InsufficientVocalConfidence(f64),
}

impl Failure {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
