//! Error types shared by every layer of the client.
//!
//! Transport failures are described by [`TransportError`] next to the
//! transports themselves; everything the caller sees is folded into
//! [`IrbisError`].
use std::{io, path::PathBuf};

use thiserror::Error;

use crate::protocol::{TransportError, codes};

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, IrbisError>;

/// List of possible errors a session or one of its codecs can produce.
#[derive(Debug, Error)]
pub enum IrbisError {
    /// A required connection parameter is missing. Raised before any I/O.
    #[error("missing connection parameter '{0}'")]
    Configuration(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a negative return code the command does not accept.
    #[error("server returned {code}: {}", codes::describe(*code))]
    Protocol { code: i32 },

    /// A `require_*` call found the resource absent.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Malformed local input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Server data that cannot be decoded.
    #[error("malformed server data: {0}")]
    Malformed(String),

    #[error("failed to read settings from {}: {source}", path.display())]
    SettingsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings: {0}")]
    SettingsFormat(#[from] serde_json::Error),
}

impl IrbisError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        IrbisError::Validation(reason.into())
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        IrbisError::Malformed(reason.into())
    }

    /// Server return code carried by a [`IrbisError::Protocol`] error.
    pub fn code(&self) -> Option<i32> {
        match self {
            IrbisError::Protocol { code } => Some(*code),
            _ => None,
        }
    }
}
