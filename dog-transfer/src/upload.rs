use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use crate::options::UPLOAD_PART_OPTIONS;
use crate::{
    ChunkReader, CompletedPart, ObjectStore, PoolTask, Progress, TransferConfig, TransferError,
    TransferOptions, TransferResult, UploadSession, WorkerPool,
};

/// Uploads a file as a multipart session.
///
/// The file is cut into `part_size` regions, each streamed from its own
/// [`ChunkReader`] by a pool task. Any failure aborts the session.
pub struct MultipartUploader<S, P> {
    store: Arc<S>,
    pool: Arc<P>,
    config: TransferConfig,
}

impl<S, P> MultipartUploader<S, P>
where
    S: ObjectStore + 'static,
    P: WorkerPool,
{
    pub fn new(store: Arc<S>, pool: Arc<P>, config: TransferConfig) -> Self {
        Self {
            store,
            pool,
            config,
        }
    }

    /// Upload `path` (of `file_size` bytes) to `bucket/key`.
    ///
    /// Failures after the session exists are reported as
    /// [`TransferError::UploadFailed`]; a failure to create the session is
    /// returned as is.
    #[instrument(skip(self, path, options, progress), fields(path = %path.display()))]
    pub async fn upload(
        &self,
        path: &Path,
        file_size: u64,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
        progress: Option<Progress>,
    ) -> TransferResult<()> {
        let part_size = self.config.part_size;
        let num_parts = file_size.div_ceil(part_size);
        if u32::try_from(num_parts).is_err() {
            return Err(TransferError::invalid_config(format!(
                "{} bytes in parts of {} needs more than {} parts",
                file_size,
                part_size,
                u32::MAX
            )));
        }

        let upload_id = self
            .store
            .create_multipart_upload(bucket, key, options)
            .await?;
        debug!(%upload_id, num_parts, "Created multipart upload");

        let mut session = UploadSession::new(bucket, key, upload_id);
        let part_options = Arc::new(options.filtered(UPLOAD_PART_OPTIONS));
        let failed = Arc::new(AtomicBool::new(false));

        let tasks: Vec<PoolTask<Option<CompletedPart>>> = (0..num_parts)
            .map(|index| {
                let part = PartUpload {
                    store: self.store.clone(),
                    path: path.to_path_buf(),
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    upload_id: session.upload_id.clone(),
                    part_number: index as u32 + 1,
                    start: index * part_size,
                    part_size,
                    options: part_options.clone(),
                    progress: progress.clone(),
                };
                let failed = failed.clone();
                async move {
                    if failed.load(Ordering::Acquire) {
                        return Ok(None);
                    }
                    let result = part.run().await;
                    if result.is_err() {
                        failed.store(true, Ordering::Release);
                    }
                    result.map(Some)
                }
                .boxed()
            })
            .collect();

        let mut first_error = None;
        for result in self.pool.run_all(tasks).await {
            match result {
                Ok(Some(part)) => session.record_part(part),
                Ok(None) => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(self.fail(&session, path, e).await);
        }

        let parts = session.completed_parts();
        if let Err(e) = self
            .store
            .complete_multipart_upload(bucket, key, &session.upload_id, &parts)
            .await
        {
            return Err(self.fail(&session, path, e.into()).await);
        }

        info!(upload_id = %session.upload_id, parts = parts.len(), "Completed multipart upload");
        Ok(())
    }

    /// Abort the session and wrap `source` for the caller
    async fn fail(&self, session: &UploadSession, path: &Path, source: TransferError) -> TransferError {
        warn!(upload_id = %session.upload_id, "Multipart upload failed: {}", source);
        if let Err(e) = self
            .store
            .abort_multipart_upload(&session.bucket, &session.key, &session.upload_id)
            .await
        {
            warn!(upload_id = %session.upload_id, "Failed to abort multipart upload: {}", e);
        }

        TransferError::UploadFailed {
            path: path.display().to_string(),
            bucket: session.bucket.clone(),
            key: session.key.clone(),
            source: Box::new(source),
        }
    }
}

/// Everything one part task needs, owned so the task can be spawned
struct PartUpload<S> {
    store: Arc<S>,
    path: PathBuf,
    bucket: String,
    key: String,
    upload_id: String,
    part_number: u32,
    start: u64,
    part_size: u64,
    options: Arc<TransferOptions>,
    progress: Option<Progress>,
}

impl<S: ObjectStore> PartUpload<S> {
    async fn run(self) -> TransferResult<CompletedPart> {
        let mut body =
            ChunkReader::open(&self.path, self.start, self.part_size, self.progress).await?;
        debug!(part_number = self.part_number, len = body.len(), "Uploading part");

        let etag = self
            .store
            .upload_part(
                &self.bucket,
                &self.key,
                &self.upload_id,
                self.part_number,
                &mut body,
                &self.options,
            )
            .await?;
        body.close();

        Ok(CompletedPart::new(self.part_number, etag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StoreCall;
    use crate::{InlinePool, MemoryObjectStore, ProgressCounter, TokioPool};
    use std::io::Write;

    fn sample_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 241) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    fn config(part_size: u64) -> TransferConfig {
        TransferConfig::new()
            .with_part_size(part_size)
            .with_multipart_threshold(part_size)
    }

    #[tokio::test]
    async fn uploads_every_part_and_completes_in_order() {
        let file = sample_file(10_000);
        let store = MemoryObjectStore::new();
        let uploader = MultipartUploader::new(
            Arc::new(store.clone()),
            Arc::new(TokioPool::new(3)),
            config(3_000),
        );
        let counter = ProgressCounter::new();

        uploader
            .upload(
                file.path(),
                10_000,
                "bucket",
                "big.bin",
                &TransferOptions::new(),
                Some(counter.clone() as Progress),
            )
            .await
            .unwrap();

        let stored = store.object("bucket", "big.bin").unwrap();
        assert_eq!(stored.as_ref(), std::fs::read(file.path()).unwrap().as_slice());
        assert_eq!(counter.total(), 10_000);

        let completed = store
            .calls()
            .into_iter()
            .find_map(|call| match call {
                StoreCall::CompleteMultipartUpload { part_numbers, .. } => Some(part_numbers),
                _ => None,
            })
            .unwrap();
        assert_eq!(completed, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn part_requests_only_carry_part_options() {
        let file = sample_file(2_048);
        let store = MemoryObjectStore::new();
        let uploader =
            MultipartUploader::new(Arc::new(store.clone()), Arc::new(InlinePool), config(1_024));
        let options = TransferOptions::new()
            .with("ContentType", "application/octet-stream")
            .with("SSECustomerAlgorithm", "AES256")
            .with("RequestPayer", "requester");

        uploader
            .upload(file.path(), 2_048, "bucket", "k", &options, None)
            .await
            .unwrap();

        for call in store.calls() {
            if let StoreCall::UploadPart { options, .. } = call {
                assert_eq!(options.get("ContentType"), None);
                assert_eq!(options.get("SSECustomerAlgorithm"), Some("AES256"));
                assert_eq!(options.get("RequestPayer"), Some("requester"));
            }
        }
        assert_eq!(
            store.object_options("bucket", "k").unwrap().get("ContentType"),
            Some("application/octet-stream")
        );
    }
}
