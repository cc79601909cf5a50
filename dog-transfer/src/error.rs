use thiserror::Error;

use crate::options::Direction;

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Result type for storage-API calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the transfer engine
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid {direction} option: {key}")]
    InvalidOption { key: String, direction: Direction },

    #[error("Invalid transfer config: {message}")]
    InvalidConfig { message: String },

    #[error("Write queue has been shut down")]
    QueueShutdown,

    #[error("Part {part_index} failed after {attempts} attempts: {source}")]
    RetriesExceeded {
        part_index: u64,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Failed to upload {path} to {bucket}/{key}: {source}")]
    UploadFailed {
        path: String,
        bucket: String,
        key: String,
        #[source]
        source: Box<TransferError>,
    },

    #[error("Storage error: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Worker task failed: {message}")]
    Worker { message: String },
}

impl TransferError {
    /// Create an invalid option error
    pub fn invalid_option<S: Into<String>>(key: S, direction: Direction) -> Self {
        Self::InvalidOption {
            key: key.into(),
            direction,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a worker error (panicked or cancelled task)
    pub fn worker<S: Into<String>>(message: S) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// True for the internal signal raised by a shut-down write queue
    pub fn is_queue_shutdown(&self) -> bool {
        matches!(self, Self::QueueShutdown)
    }
}

/// Errors reported by an [`ObjectStore`](crate::ObjectStore) implementation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Read timed out")]
    ReadTimeout,

    #[error("Connection timed out")]
    ConnectTimeout,

    #[error("Connection reset: {message}")]
    ConnectionReset { message: String },

    #[error("Incomplete read: expected {expected} bytes, received {received}")]
    IncompleteRead { expected: u64, received: u64 },

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Upload session not found: {upload_id}")]
    NoSuchUpload { upload_id: String },

    #[error("Service error: {message}")]
    Service { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Transient conditions are retried locally by the part that hit them
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ReadTimeout
                | Self::ConnectTimeout
                | Self::ConnectionReset { .. }
                | Self::IncompleteRead { .. }
        )
    }

    /// Create a connection reset error
    pub fn connection_reset<S: Into<String>>(message: S) -> Self {
        Self::ConnectionReset {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<B: Into<String>, K: Into<String>>(bucket: B, key: K) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create an upload session not found error
    pub fn no_such_upload<S: Into<String>>(upload_id: S) -> Self {
        Self::NoSuchUpload {
            upload_id: upload_id.into(),
        }
    }

    /// Create a generic service error
    pub fn service<S: Into<String>>(message: S) -> Self {
        Self::Service {
            message: message.into(),
        }
    }
}
