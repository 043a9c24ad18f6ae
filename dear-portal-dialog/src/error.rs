//! Error types for portal dialogs
//!
//! Failures fall into a few families: the bus itself (transport), replies that
//! do not have the expected shape (protocol), URIs that cannot be turned into
//! paths (decode), and the caller-facing conditions of the pollable API.
//! User cancellation is reported through [`PortalError::Cancelled`] so that the
//! usual `Result` plumbing carries all three outcomes of a dialog.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Result type for portal operations
pub type PortalResult<T> = Result<T, PortalError>;

/// Errors returned by portal dialogs
#[derive(Error, Debug)]
pub enum PortalError {
    /// User closed the dialog without choosing anything
    #[error("cancelled")]
    Cancelled,

    /// The bus connection failed, or a call got no reply
    #[error("{message}")]
    Transport { message: String },

    /// A reply was missing a field or had a field of the wrong type
    #[error("{message}")]
    Protocol { message: String },

    /// A returned URI could not be turned into a path
    #[error("{message}")]
    Decode { message: String },

    /// Index past the end of a path set
    #[error("Index out of bounds.")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Number of paths in the set
        len: usize,
    },

    /// A pollable dialog has not produced its result yet
    #[error("response not ready")]
    NotReady,

    /// The result of a pollable dialog was already taken
    #[error("response already taken")]
    AlreadyTaken,

    /// The background monitor thread could not be started
    #[error("failed to start dialog monitor: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Local filesystem error (e.g. while resolving a path)
    #[error("{context}: {source}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl PortalError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        #[cfg(feature = "tracing")]
        warn!("Transport failure: {}", message);
        Self::Transport { message }
    }

    /// Create a protocol-shape error
    pub fn protocol(message: impl Into<String>) -> Self {
        let message = message.into();
        #[cfg(feature = "tracing")]
        warn!("Protocol error: {}", message);
        Self::Protocol { message }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        let message = message.into();
        #[cfg(feature = "tracing")]
        debug!("Decode error: {}", message);
        Self::Decode { message }
    }

    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        let context = context.into();
        #[cfg(feature = "tracing")]
        debug!("IO error: {}: {}", context, source);
        Self::Io { context, source }
    }

    /// Returns `true` for the user-cancelled outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Message of the most recent failure, shared between a portal and the
/// dialogs it started.
#[derive(Clone, Debug, Default)]
pub(crate) struct LastError(Arc<Mutex<Option<String>>>);

impl LastError {
    /// Remember `err`, unless it is a cancellation.
    pub(crate) fn record(&self, err: &PortalError) {
        if !err.is_cancelled() {
            *self.0.lock() = Some(err.to_string());
        }
    }

    pub(crate) fn get(&self) -> Option<String> {
        self.0.lock().clone()
    }

    pub(crate) fn clear(&self) {
        *self.0.lock() = None;
    }
}
