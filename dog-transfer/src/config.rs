use serde::{Deserialize, Serialize};

use crate::{TransferError, TransferResult};

const MIB: u64 = 1024 * 1024;

/// Configuration for a transfer engine. Immutable once handed to a
/// [`TransferManager`](crate::TransferManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Objects of at least this many bytes use the multipart path
    pub multipart_threshold: u64,

    /// Size of each part (the last part may be shorter)
    pub part_size: u64,

    /// Maximum number of part operations in flight
    pub max_concurrency: usize,

    /// Attempts per download part before giving up
    pub max_download_attempts: u32,

    /// Capacity of the write queue feeding the download writer
    pub max_queued_writes: usize,

    /// Size of each write handed to the download writer
    pub io_chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: 8 * MIB,
            part_size: 8 * MIB,
            max_concurrency: 10,
            max_download_attempts: 5,
            max_queued_writes: 100,
            io_chunk_size: 256 * 1024,
        }
    }
}

impl TransferConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set multipart threshold
    pub fn with_multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    /// Set part size
    pub fn with_part_size(mut self, bytes: u64) -> Self {
        self.part_size = bytes;
        self
    }

    /// Set max concurrency
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    /// Set max download attempts per part
    pub fn with_max_download_attempts(mut self, attempts: u32) -> Self {
        self.max_download_attempts = attempts;
        self
    }

    /// Set write queue capacity
    pub fn with_max_queued_writes(mut self, writes: usize) -> Self {
        self.max_queued_writes = writes;
        self
    }

    /// Set download write increment
    pub fn with_io_chunk_size(mut self, bytes: usize) -> Self {
        self.io_chunk_size = bytes;
        self
    }

    /// Every field must be positive
    pub fn validate(&self) -> TransferResult<()> {
        let zero = [
            ("multipart_threshold", self.multipart_threshold == 0),
            ("part_size", self.part_size == 0),
            ("max_concurrency", self.max_concurrency == 0),
            ("max_download_attempts", self.max_download_attempts == 0),
            ("max_queued_writes", self.max_queued_writes == 0),
            ("io_chunk_size", self.io_chunk_size == 0),
        ];

        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(TransferError::invalid_config(format!(
                "{} must be greater than zero",
                field
            ))),
            None => Ok(()),
        }
    }

    /// Load overrides from the process environment.
    ///
    /// `DOGTRANSFER__PART_SIZE=16777216` sets `part_size` when called with
    /// prefix `"DOGTRANSFER__"`. Unset fields keep their defaults.
    pub fn from_env(prefix: &str) -> TransferResult<Self> {
        let pairs = std::env::vars().filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .map(|stripped| (stripped.to_lowercase(), value))
        });
        Self::from_pairs(pairs)
    }

    /// Build a config from `field = value` pairs; unknown fields are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> TransferResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            match key {
                "multipart_threshold" => config.multipart_threshold = parse_field(key, value)?,
                "part_size" => config.part_size = parse_field(key, value)?,
                "max_concurrency" => config.max_concurrency = parse_field(key, value)?,
                "max_download_attempts" => config.max_download_attempts = parse_field(key, value)?,
                "max_queued_writes" => config.max_queued_writes = parse_field(key, value)?,
                "io_chunk_size" => config.io_chunk_size = parse_field(key, value)?,
                other => {
                    return Err(TransferError::invalid_config(format!(
                        "unknown config field: {}",
                        other
                    )))
                }
            }
        }
        Ok(config)
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> TransferResult<T> {
    value.parse().map_err(|_| {
        TransferError::invalid_config(format!("{} is not a valid value for {}", value, key))
    })
}
