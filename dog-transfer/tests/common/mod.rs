#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use dog_transfer::{
    ByteRange, ByteStream, ChunkReader, CompletedPart, MemoryObjectStore, ObjectHead, ObjectStore,
    StoreError, StoreResult, TransferConfig, TransferOptions,
};

pub const MIB: u64 = 1024 * 1024;

/// Deterministic, non-repeating-looking payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 7) % 256) as u8).collect()
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(data).unwrap();
    path
}

/// Small sizes so tests stay fast: 1 KiB parts, 2 KiB threshold
pub fn small_config() -> TransferConfig {
    TransferConfig::new()
        .with_multipart_threshold(2_048)
        .with_part_size(1_024)
        .with_max_concurrency(4)
        .with_io_chunk_size(256)
        .with_max_queued_writes(8)
        .with_max_download_attempts(3)
}

/// Names of every file in `dir`
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// How a ranged read should misbehave
#[derive(Debug, Clone, Copy)]
pub enum RangeFault {
    /// Fail the request with a read timeout
    Timeout,
    /// Send half the range, then end the body
    Truncate,
    /// Fail with a non-retryable service error
    Fatal,
    /// Delay the response
    Delay(Duration),
}

/// [`MemoryObjectStore`] with injectable failures
#[derive(Clone)]
pub struct FaultyStore {
    pub inner: MemoryObjectStore,
    /// Remaining faults per range start offset
    range_faults: Arc<Mutex<HashMap<u64, Vec<RangeFault>>>>,
    /// Part numbers whose upload fails permanently
    failing_parts: Arc<Mutex<Vec<u32>>>,
    fail_complete: Arc<Mutex<bool>>,
    fail_create: Arc<Mutex<bool>>,
    pub store_calls: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new(inner: MemoryObjectStore) -> Self {
        Self {
            inner,
            range_faults: Arc::new(Mutex::new(HashMap::new())),
            failing_parts: Arc::new(Mutex::new(Vec::new())),
            fail_complete: Arc::new(Mutex::new(false)),
            fail_create: Arc::new(Mutex::new(false)),
            store_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue `faults` for the range starting at `start`, consumed one per request
    pub fn fail_range(&self, start: u64, faults: Vec<RangeFault>) {
        self.range_faults.lock().insert(start, faults);
    }

    pub fn fail_part(&self, part_number: u32) {
        self.failing_parts.lock().push(part_number);
    }

    pub fn fail_complete(&self) {
        *self.fail_complete.lock() = true;
    }

    pub fn fail_create(&self) {
        *self.fail_create.lock() = true;
    }

    pub fn clear_faults(&self) {
        self.range_faults.lock().clear();
        self.failing_parts.lock().clear();
        *self.fail_complete.lock() = false;
        *self.fail_create.lock() = false;
    }

    fn next_fault(&self, start: u64) -> Option<RangeFault> {
        let mut faults = self.range_faults.lock();
        let pending = faults.get_mut(&start)?;
        if pending.is_empty() {
            None
        } else {
            Some(pending.remove(0))
        }
    }

    fn count(&self) {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
    ) -> StoreResult<String> {
        self.count();
        if *self.fail_create.lock() {
            return Err(StoreError::service("create rejected"));
        }
        self.inner.create_multipart_upload(bucket, key, options).await
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: &mut ChunkReader,
        options: &TransferOptions,
    ) -> StoreResult<String> {
        self.count();
        if self.failing_parts.lock().contains(&part_number) {
            return Err(StoreError::service(format!("part {} rejected", part_number)));
        }
        self.inner
            .upload_part(bucket, key, upload_id, part_number, body, options)
            .await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        self.count();
        if *self.fail_complete.lock() {
            return Err(StoreError::service("completion rejected"));
        }
        self.inner
            .complete_multipart_upload(bucket, key, upload_id, parts)
            .await
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.count();
        self.inner.abort_multipart_upload(bucket, key, upload_id).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut ChunkReader,
        options: &TransferOptions,
    ) -> StoreResult<()> {
        self.count();
        self.inner.put_object(bucket, key, body, options).await
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
        options: &TransferOptions,
    ) -> StoreResult<ByteStream> {
        self.count();
        let start = range.map(|r| r.start).unwrap_or(0);

        match self.next_fault(start) {
            None => self.inner.get_object(bucket, key, range, options).await,
            Some(RangeFault::Timeout) => Err(StoreError::ReadTimeout),
            Some(RangeFault::Fatal) => Err(StoreError::service("access denied")),
            Some(RangeFault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                self.inner.get_object(bucket, key, range, options).await
            }
            Some(RangeFault::Truncate) => {
                let body = self.inner.get_object(bucket, key, range, options).await?;
                let chunks: Vec<Result<Bytes, StoreError>> = body.collect().await;
                let mut data = Vec::new();
                for chunk in chunks {
                    data.extend_from_slice(&chunk?);
                }
                data.truncate(data.len() / 2);
                let half: Result<Bytes, StoreError> = Ok(Bytes::from(data));
                let body: ByteStream = Box::pin(stream::iter(vec![half]));
                Ok(body)
            }
        }
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
    ) -> StoreResult<ObjectHead> {
        self.count();
        self.inner.head_object(bucket, key, options).await
    }
}
