use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    ByteRange, ByteStream, ChunkReader, CompletedPart, ObjectHead, ObjectStore, StoreError,
    StoreResult, TransferOptions,
};

type ObjectKey = (String, String);

/// A storage-API call as seen by [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    CreateMultipartUpload { bucket: String, key: String },
    UploadPart { upload_id: String, part_number: u32, len: u64, options: TransferOptions },
    CompleteMultipartUpload { upload_id: String, part_numbers: Vec<u32> },
    AbortMultipartUpload { upload_id: String },
    PutObject { bucket: String, key: String, len: u64 },
    GetObject { bucket: String, key: String, range: Option<ByteRange> },
    HeadObject { bucket: String, key: String },
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    options: TransferOptions,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    options: TransferOptions,
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// In-memory object store for testing and development.
///
/// Clones share state, so a test can hand one clone to a
/// [`TransferManager`](crate::TransferManager) and inspect another. Every call
/// is recorded in order; see [`calls`](MemoryObjectStore::calls).
#[derive(Clone)]
pub struct MemoryObjectStore {
    /// Finished objects by (bucket, key)
    objects: Arc<RwLock<HashMap<ObjectKey, StoredObject>>>,

    /// Open multipart sessions by upload id
    sessions: Arc<RwLock<HashMap<String, PendingUpload>>>,

    calls: Arc<Mutex<Vec<StoreCall>>>,

    /// Size of the pieces `get_object` streams back
    stream_chunk_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            stream_chunk_size: 64 * 1024,
        }
    }

    pub fn with_stream_chunk_size(mut self, bytes: usize) -> Self {
        self.stream_chunk_size = bytes.max(1);
        self
    }

    /// Store an object directly, bypassing the call log
    pub fn insert_object<B, K, D>(&self, bucket: B, key: K, data: D)
    where
        B: Into<String>,
        K: Into<String>,
        D: Into<Bytes>,
    {
        let data = data.into();
        let object = StoredObject {
            etag: etag_for(&data),
            data,
            options: TransferOptions::new(),
        };
        self.objects.write().insert((bucket.into(), key.into()), object);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .get(&object_key(bucket, key))
            .map(|object| object.data.clone())
    }

    /// Options the object was created with
    pub fn object_options(&self, bucket: &str, key: &str) -> Option<TransferOptions> {
        self.objects
            .read()
            .get(&object_key(bucket, key))
            .map(|object| object.options.clone())
    }

    /// Multipart sessions neither completed nor aborted
    pub fn open_sessions(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }
}

fn object_key(bucket: &str, key: &str) -> ObjectKey {
    (bucket.to_string(), key.to_string())
}

fn etag_for(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
    ) -> StoreResult<String> {
        self.record(StoreCall::CreateMultipartUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });

        let upload_id = Uuid::new_v4().to_string();
        self.sessions.write().insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                options: options.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: &mut ChunkReader,
        options: &TransferOptions,
    ) -> StoreResult<String> {
        self.record(StoreCall::UploadPart {
            upload_id: upload_id.to_string(),
            part_number,
            len: body.len(),
            options: options.clone(),
        });

        let data = body.read_to_end().await?;
        let etag = etag_for(&data);

        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| StoreError::no_such_upload(upload_id))?;
        session.parts.insert(part_number, (etag.clone(), data));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        self.record(StoreCall::CompleteMultipartUpload {
            upload_id: upload_id.to_string(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });

        let session = self
            .sessions
            .write()
            .remove(upload_id)
            .ok_or_else(|| StoreError::no_such_upload(upload_id))?;
        if session.bucket != bucket || session.key != key {
            return Err(StoreError::no_such_upload(upload_id));
        }

        let mut data = Vec::new();
        for part in parts {
            match session.parts.get(&part.part_number) {
                Some((etag, body)) if *etag == part.etag => data.extend_from_slice(body),
                _ => {
                    return Err(StoreError::service(format!(
                        "InvalidPart: part {} of upload {}",
                        part.part_number, upload_id
                    )))
                }
            }
        }

        let data = Bytes::from(data);
        let object = StoredObject {
            etag: etag_for(&data),
            data,
            options: session.options,
        };
        self.objects.write().insert(object_key(bucket, key), object);
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.record(StoreCall::AbortMultipartUpload {
            upload_id: upload_id.to_string(),
        });

        self.sessions
            .write()
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::no_such_upload(upload_id))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut ChunkReader,
        options: &TransferOptions,
    ) -> StoreResult<()> {
        self.record(StoreCall::PutObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            len: body.len(),
        });

        let data = body.read_to_end().await?;
        let object = StoredObject {
            etag: etag_for(&data),
            data,
            options: options.clone(),
        };
        self.objects.write().insert(object_key(bucket, key), object);
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
        _options: &TransferOptions,
    ) -> StoreResult<ByteStream> {
        self.record(StoreCall::GetObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            range,
        });

        let data = self
            .object(bucket, key)
            .ok_or_else(|| StoreError::not_found(bucket, key))?;

        let data = match range {
            None => data,
            Some(range) => {
                let size = data.len() as u64;
                if range.start >= size || range.is_empty() {
                    return Err(StoreError::service(format!(
                        "InvalidRange: {} of {} bytes",
                        range, size
                    )));
                }
                let end = range.end.min(size - 1);
                data.slice(range.start as usize..=end as usize)
            }
        };

        let chunk_size = self.stream_chunk_size;
        let stream: ByteStream = Box::pin(async_stream::stream! {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + chunk_size).min(data.len());
                yield Ok::<_, StoreError>(data.slice(offset..end));
                offset = end;
            }
        });
        Ok(stream)
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &TransferOptions,
    ) -> StoreResult<ObjectHead> {
        self.record(StoreCall::HeadObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });

        let objects = self.objects.read();
        let object = objects
            .get(&object_key(bucket, key))
            .ok_or_else(|| StoreError::not_found(bucket, key))?;

        let mut head = ObjectHead::new(object.data.len() as u64).with_etag(object.etag.clone());
        if let Some(content_type) = object.options.get("ContentType") {
            head = head.with_content_type(content_type);
        }
        Ok(head)
    }
}
