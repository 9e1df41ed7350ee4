//! Error types for the engine and its device collaborator.

use std::{io, path::PathBuf, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Result type returned by [`Device`](crate::Device) operations.
pub type DeviceResult<T> = StdResult<T, DeviceError>;

/// Unified error type for the deckd engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Icon file missing or unreadable.
    #[error("Cannot read icon {}: {source}", path.display())]
    Io {
        /// Path of the icon.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Icon data is corrupt or in an unsupported format.
    #[error("Cannot decode icon {}: {source}", path.display())]
    Decode {
        /// Path of the icon.
        path: PathBuf,
        /// Underlying decode failure.
        #[source]
        source: image::ImageError,
    },

    /// Device reported a failure of the physical link.
    #[error("Device transport error: {0}")]
    Transport(String),

    /// Device rejected an operation without losing the link.
    #[error("Device error: {0}")]
    Device(String),

    /// No handler registered under the given kind name.
    #[error("Unknown {capability} handler '{kind}'")]
    UnknownHandler {
        /// Capability that was looked up (`icon` or `key`).
        capability: &'static str,
        /// Requested kind name.
        kind: String,
    },

    /// An external command could not be launched.
    #[error("Failed to launch '{command}': {source}")]
    Command {
        /// The command line.
        command: String,
        /// Underlying spawn failure.
        #[source]
        source: io::Error,
    },

    /// Page index outside the configured deck.
    #[error("Page {0} does not exist")]
    PageOutOfRange(usize),
}

/// Failure reported by a [`Device`](crate::Device) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The physical link is gone (USB unplugged, HID handle invalid).
    #[error("transport: {0}")]
    Transport(String),
    /// The device refused the request; the link is still usable.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl DeviceError {
    /// True when the failure means the device is no longer reachable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Transport(msg) => Self::Transport(msg),
            DeviceError::Rejected(msg) => Self::Device(msg),
        }
    }
}
