//! Error types for the Oracle thin driver.

use std::io;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed row from a batch execution with batch errors enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    /// Zero-based row offset within the batch.
    pub offset: u32,
    /// ORA- error number for that row.
    pub code: u32,
    /// Server message, when supplied.
    pub message: Option<String>,
}

/// Error type for driver operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection refused by the server.
    #[error("Connection refused: {message}")]
    ConnectionRefused { message: String },

    /// Invalid service name.
    #[error("Invalid service name: {service_name}")]
    InvalidServiceName { service_name: String },

    /// Invalid SID.
    #[error("Invalid SID: {sid}")]
    InvalidSid { sid: String },

    /// Server version not supported.
    #[error("Server version not supported (minimum required: {min_version})")]
    ServerVersionNotSupported { min_version: u16 },

    /// Unsupported verifier profile offered during authentication.
    #[error("Unsupported verifier type: {verifier_type:#x}")]
    UnsupportedVerifierType { verifier_type: u32 },

    /// Invalid server response during authentication.
    #[error("Invalid server response during authentication")]
    InvalidServerResponse,

    /// Protocol error.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Unexpected packet type received.
    #[error("Unexpected packet type: expected {expected}, got {actual}")]
    UnexpectedPacketType { expected: u8, actual: u8 },

    /// A packet declared a length beyond the configured maximum.
    #[error("Packet length {length} exceeds maximum {max}")]
    PacketTooLarge { length: usize, max: usize },

    /// Connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Oracle database error.
    #[error("ORA-{code:05}: {message}")]
    Oracle {
        code: u32,
        message: String,
        /// Offset into the SQL text, when the server supplies one.
        position: u16,
        /// Server cursor id the error belongs to.
        cursor_id: u16,
        /// Rows processed before the error.
        row_count: u64,
        /// Per-row errors from a batch execution, when batch errors are on.
        batch_errors: Vec<BatchError>,
    },

    /// A string literal in the SQL text was never closed.
    #[error("Statement contains a string literal with no closing quote")]
    MissingEndingQuote,

    /// A decimal value has no Oracle NUMBER representation.
    #[error("Value has no Oracle NUMBER representation: {text}")]
    NumberOverflow { text: String },

    /// A timestamp used a region-id timezone, which is not resolvable here.
    #[error("Named (region-id) time zones are not supported")]
    NamedTimeZoneNotSupported,

    /// Type conversion error.
    #[error("Type conversion error: {message}")]
    TypeConversion { message: String },

    /// Column not found.
    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    /// Column index out of bounds.
    #[error("Column index {index} out of bounds (columns: {count})")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    /// Null value error.
    #[error("Unexpected NULL value in column {column}")]
    NullValue { column: String },

    /// Buffer too small: the decoder needs more data before it can retry.
    #[error("Buffer too small: need {needed} bytes, have {available} at {location}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        location: &'static Location<'static>,
    },

    /// Invalid connect string.
    #[error("Invalid connect string: {message}")]
    InvalidConnectString { message: String },

    /// Unsupported Oracle data type.
    #[error("Unsupported Oracle data type: {type_num}")]
    UnsupportedType { type_num: u8 },

    /// Connection timed out during TCP connect.
    #[error("Connection to {host}:{port} timed out after {timeout:?}")]
    ConnectionTimeout {
        host: String,
        port: u16,
        timeout: std::time::Duration,
    },

    /// The row stream was cancelled by the consumer.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an Oracle database error with no positional detail.
    pub fn oracle(code: u32, message: impl Into<String>) -> Self {
        Self::Oracle {
            code,
            message: message.into(),
            position: 0,
            cursor_id: 0,
            row_count: 0,
            batch_errors: Vec::new(),
        }
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// The ORA- number when this is a server error.
    pub fn oracle_code(&self) -> Option<u32> {
        match self {
            Self::Oracle { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error is fatal to the connection (as opposed to the
    /// statement that triggered it).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ConnectionClosed
                | Self::ConnectionRefused { .. }
                | Self::ConnectionTimeout { .. }
                | Self::PacketTooLarge { .. }
                | Self::UnexpectedPacketType { .. }
        )
    }
}

/// Outcome record for [`Connection::with_transaction`].
///
/// The closure, the commit and the rollback can each fail independently;
/// every failure that occurred is retained.
///
/// [`Connection::with_transaction`]: crate::Connection::with_transaction
#[derive(Debug, Default)]
pub struct TransactionError {
    /// Error returned by the user closure.
    pub closure_error: Option<Error>,
    /// Error from the COMMIT round trip.
    pub commit_error: Option<Error>,
    /// Error from the ROLLBACK round trip.
    pub rollback_error: Option<Error>,
}

impl TransactionError {
    pub(crate) fn from_closure(err: Error) -> Self {
        Self {
            closure_error: Some(err),
            ..Self::default()
        }
    }
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut wrote = false;
        if let Some(e) = &self.closure_error {
            write!(f, "closure error: {}", e)?;
            wrote = true;
        }
        if let Some(e) = &self.commit_error {
            if wrote {
                write!(f, "; ")?;
            }
            write!(f, "commit error: {}", e)?;
            wrote = true;
        }
        if let Some(e) = &self.rollback_error {
            if wrote {
                write!(f, "; ")?;
            }
            write!(f, "rollback error: {}", e)?;
            wrote = true;
        }
        if !wrote {
            write!(f, "transaction failed")?;
        }
        Ok(())
    }
}

impl std::error::Error for TransactionError {}
