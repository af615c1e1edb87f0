//! Error taxonomy for the replay engine.
//!
//! Fixture problems are soft (logged, the entry or file is skipped) unless
//! they come from configuration, which is fatal at session setup. Request
//! problems are fatal only for the one call that raised them.

use std::path::PathBuf;

use thiserror::Error;

use crate::identifier::Identifier;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ReplayError {
    /// Fixture file missing, not JSON, or not an array of objects.
    #[error("fixture {path} is unreadable: {reason}")]
    FixtureUnreadable { path: PathBuf, reason: String },

    /// A configuration value needed to locate fixtures is absent.
    #[error("fixture path not configured: {setting} is not set")]
    FixturePathNotFound { setting: &'static str },

    /// The request could not be reduced to an [`Identifier`].
    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    /// Replay-or-fail miss.
    #[error("no fixture available for {identifier}")]
    NoFixtureAvailable { identifier: Identifier },

    /// Live call failed, or a recorded failure was replayed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReplayError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FixtureUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Machine-readable code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FixtureUnreadable { .. } => "FIXTURE_UNREADABLE",
            Self::FixturePathNotFound { .. } => "FIXTURE_PATH_NOT_FOUND",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::NoFixtureAvailable { .. } => "NO_FIXTURE_AVAILABLE",
            Self::Transport(_) => "TRANSPORT",
            Self::Config { .. } => "CONFIG",
            Self::Io(_) => "IO",
            Self::Json(_) => "JSON",
        }
    }
}

/// Result type for replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;
