//! Error types for Setu

use crate::link::ConnectivityState;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
///
/// The framing, routing and gating variants are absorbed by the pipeline
/// loops (logged and reported to the status sink). The rest only surface
/// during startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reassembly buffer would exceed its capacity; buffered bytes were dropped
    #[error("Reassembly buffer overflow: {buffered} buffered + {incoming} incoming > {capacity}")]
    BufferOverflow {
        /// Bytes already held when the chunk arrived
        buffered: usize,
        /// Size of the rejected chunk
        incoming: usize,
        /// Buffer capacity
        capacity: usize,
    },

    /// Closing brace without a matching opening brace
    #[error("Malformed frame: unbalanced '}}' at chunk offset {offset}")]
    MalformedFrame {
        /// Offset of the offending byte within its chunk
        offset: usize,
    },

    /// Frame is not valid JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Frame decoded to something other than a non-empty object
    #[error("Frame is not an object with at least one member")]
    EmptyObject,

    /// Dispatch attempted while the uplink is not connected
    #[error("Uplink not ready (link is {0})")]
    LinkNotReady(ConnectivityState),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Classify pipeline faults for the status sink
    pub fn fault_kind(&self) -> Option<crate::status::FaultKind> {
        use crate::status::FaultKind;
        match self {
            Error::BufferOverflow { .. } => Some(FaultKind::BufferOverflow),
            Error::MalformedFrame { .. } => Some(FaultKind::MalformedFrame),
            Error::InvalidJson(_) => Some(FaultKind::InvalidJson),
            Error::EmptyObject => Some(FaultKind::EmptyObject),
            Error::LinkNotReady(_) => Some(FaultKind::LinkNotReady),
            _ => None,
        }
    }
}
