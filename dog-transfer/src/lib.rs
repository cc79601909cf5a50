//! # dog-transfer: Large-object transfers for DogRS applications
//!
//! `dog-transfer` moves files to and from a blob-storage service. Small
//! objects go in one request; large ones are split into parts that are
//! transferred concurrently with bounded memory and per-part retries.
//!
//! ## Key Features
//!
//! - **Threshold-based strategy**: single request below `multipart_threshold`, parts above it
//! - **Multipart uploads**: parts streamed straight from disk, session aborted on any failure
//! - **Ranged downloads**: concurrent range reads feeding one writer task through a bounded queue
//! - **Per-part retries**: transient failures are retried locally, progress rolled back
//! - **Storage agnostic**: the service is reached through the [`ObjectStore`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dog_transfer::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> TransferResult<()> {
//! let store = MemoryObjectStore::new();
//! let manager = TransferManager::new(store, TransferConfig::default())?;
//!
//! let progress = ProgressCounter::new();
//! let options = TransferOptions::new().with("ContentType", "video/mp4");
//! manager
//!     .upload("clip.mp4", "media", "videos/clip.mp4", &options, Some(progress.clone() as Progress))
//!     .await?;
//!
//! manager
//!     .download("media", "videos/clip.mp4", "copy.mp4", &TransferOptions::new(), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             TransferManager              │  ← strategy, options, temp files
//! ├────────────────────┬─────────────────────┤
//! │ MultipartUploader  │ MultipartDownloader │  ← parts on a WorkerPool
//! ├────────────────────┼─────────────────────┤
//! │    ChunkReader     │  CooperativeQueue   │  ← file regions / write queue
//! ├────────────────────┴─────────────────────┤
//! │               ObjectStore                │  ← storage-API primitives
//! └──────────────────────────────────────────┘
//! ```
//!
//! The crate logs through `tracing` and never installs a subscriber.

mod chunk;
mod config;
mod download;
mod error;
pub mod fs;
mod manager;
pub mod memory;
mod options;
mod pool;
mod progress;
mod queue;
mod retry;
pub mod store;
mod types;
mod upload;

pub use chunk::ChunkReader;
pub use config::TransferConfig;
pub use download::MultipartDownloader;
pub use error::{StoreError, StoreResult, TransferError, TransferResult};
pub use manager::TransferManager;
pub use memory::{MemoryObjectStore, StoreCall};
pub use options::{
    Direction, TransferOptions, ALLOWED_DOWNLOAD_OPTIONS, ALLOWED_UPLOAD_OPTIONS,
    UPLOAD_PART_OPTIONS,
};
pub use pool::{InlinePool, PoolTask, TokioPool, WorkerPool};
pub use progress::{Progress, ProgressCounter, ProgressSink};
pub use queue::CooperativeQueue;
pub use retry::{retry_part, Attempt};
pub use store::{ByteRange, ByteStream, CompletedPart, ObjectHead, ObjectStore};
pub use types::{plan_ranges, DownloadRange, UploadSession, WriteMessage, WriteTask};
pub use upload::MultipartUploader;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        MemoryObjectStore, ObjectStore, Progress, ProgressCounter, ProgressSink, TransferConfig,
        TransferError, TransferManager, TransferOptions, TransferResult,
    };
}
