use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::{ChunkReader, StoreError, StoreResult, TransferOptions};

/// Stream of object content returned by a ranged or whole-object read
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// Storage-API operations the transfer engine is built on.
///
/// Implementations issue the actual network calls (signing, HTTP and
/// connection handling live behind this trait). Bodies are handed over as a
/// [`ChunkReader`]; an implementation that needs to read a body more than once
/// should disable its callback around the extra reads and `seek(0)` before
/// sending again, so progress is not reported twice.
///
/// Errors that are worth retrying must be reported as one of the transient
/// [`StoreError`] variants.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start a multipart session, returning its upload id
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
    ) -> StoreResult<String>;

    /// Upload one part of a session, returning its ETag
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: &mut ChunkReader,
        options: &TransferOptions,
    ) -> StoreResult<String>;

    /// Finish a session; `parts` are sorted by part number
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()>;

    /// Discard a session and any parts uploaded to it
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()>;

    /// Store a whole object in one request
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut ChunkReader,
        options: &TransferOptions,
    ) -> StoreResult<()>;

    /// Read an object, or an inclusive byte range of it
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
        options: &TransferOptions,
    ) -> StoreResult<ByteStream>;

    /// Fetch object metadata without content
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
    ) -> StoreResult<ObjectHead>;
}

/// Metadata about a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHead {
    pub content_length: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

impl ObjectHead {
    pub fn new(content_length: u64) -> Self {
        Self {
            content_length,
            etag: None,
            content_type: None,
        }
    }

    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A part that made it into a multipart session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

impl CompletedPart {
    pub fn new<S: Into<String>>(part_number: u32, etag: S) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// Inclusive byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// `Range` header value, e.g. `bytes=0-1023`
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
