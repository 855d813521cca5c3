//! Engine error types.

use std::io;
use thiserror::Error;

use crate::buffer::BufferError;
use crate::connection::ConnectionState;
use crate::endpoint::EndpointError;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// IO error during socket operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Buffer bounds or allocation error.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Endpoint could not be parsed or resolved.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// Operation invalid for the connection's current state.
    #[error("invalid connection state: expected {expected}, was {actual}")]
    InvalidState {
        expected: ConnectionState,
        actual: ConnectionState,
    },

    /// The process-wide engine was initialized twice.
    #[error("engine already initialized")]
    AlreadyInitialized,

    /// A client or server was started twice.
    #[error("endpoint already started")]
    AlreadyStarted,

    /// An internal channel closed while the engine still needed it.
    #[error("engine channel closed")]
    ChannelClosed,
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Check if this error is a connection-level failure that the engine
    /// turns into an abortive close rather than a caller-visible error.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
