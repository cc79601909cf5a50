use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    fs, ChunkReader, Direction, MultipartDownloader, MultipartUploader, ObjectStore, Progress,
    TokioPool, TransferConfig, TransferError, TransferOptions, TransferResult, WorkerPool,
};

/// Entry point for file transfers.
///
/// Objects of at least `multipart_threshold` bytes go through a multipart
/// session (upload) or concurrent ranged reads (download); smaller ones take a
/// single request. The worker pool is shared by every transfer issued through
/// one manager.
pub struct TransferManager<S, P = TokioPool> {
    store: Arc<S>,
    pool: Arc<P>,
    config: TransferConfig,
}

impl<S: ObjectStore + 'static> TransferManager<S, TokioPool> {
    /// Create a manager with a [`TokioPool`] sized from the config
    pub fn new(store: S, config: TransferConfig) -> TransferResult<Self> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(store),
            pool: Arc::new(TokioPool::new(config.max_concurrency)),
            config,
        })
    }
}

impl<S, P> TransferManager<S, P>
where
    S: ObjectStore + 'static,
    P: WorkerPool,
{
    /// Swap the worker pool
    pub fn with_pool<Q: WorkerPool>(self, pool: Q) -> TransferManager<S, Q> {
        TransferManager {
            store: self.store,
            pool: Arc::new(pool),
            config: self.config,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upload the file at `path` to `bucket/key`.
    ///
    /// Options are checked against the upload allow-list before anything is
    /// sent. A multipart session that cannot be created comes back as
    /// [`TransferError::Store`]. Once a session exists, and for single-request
    /// uploads, store failures are reported as [`TransferError::UploadFailed`].
    #[instrument(skip(self, path, options, progress), fields(path = %path.as_ref().display()))]
    pub async fn upload(
        &self,
        path: impl AsRef<Path>,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
        progress: Option<Progress>,
    ) -> TransferResult<()> {
        options.validate(Direction::Upload)?;
        let path = path.as_ref();
        let size = fs::file_size(path).await?;

        if size >= self.config.multipart_threshold {
            debug!(size, "Using multipart upload");
            MultipartUploader::new(self.store.clone(), self.pool.clone(), self.config.clone())
                .upload(path, size, bucket, key, options, progress)
                .await?;
        } else {
            debug!(size, "Using single-request upload");
            self.put_whole(path, bucket, key, options, progress)
                .await
                .map_err(|source| TransferError::UploadFailed {
                    path: path.display().to_string(),
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    source: Box::new(source),
                })?;
        }

        info!(size, "Upload finished");
        Ok(())
    }

    /// Download `bucket/key` to `path`.
    ///
    /// Data is written to a temporary sibling of `path` that is renamed into
    /// place on success and removed on failure, so `path` only ever appears
    /// complete.
    #[instrument(skip(self, path, options, progress), fields(path = %path.as_ref().display()))]
    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        options: &TransferOptions,
        progress: Option<Progress>,
    ) -> TransferResult<()> {
        options.validate(Direction::Download)?;
        let destination = path.as_ref();
        let size = self.store.head_object(bucket, key, options).await?.content_length;

        let temp = fs::temp_path_for(destination);
        let downloader =
            MultipartDownloader::new(self.store.clone(), self.pool.clone(), self.config.clone());

        let result = if size >= self.config.multipart_threshold {
            debug!(size, "Using ranged download");
            downloader
                .download(bucket, key, &temp, size, options, progress)
                .await
        } else {
            debug!(size, "Using single-request download");
            downloader
                .download_whole(bucket, key, &temp, size, options, progress)
                .await
        };

        let result = match result {
            Ok(()) => tokio::fs::rename(&temp, destination)
                .await
                .map_err(TransferError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_if_exists(&temp).await {
                warn!(temp = %temp.display(), "Failed to remove temporary file: {}", cleanup);
            }
            return Err(e);
        }

        info!(size, "Download finished");
        Ok(())
    }

    async fn put_whole(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        options: &TransferOptions,
        progress: Option<Progress>,
    ) -> TransferResult<()> {
        let mut body = ChunkReader::open_whole(path, progress).await?;
        self.store.put_object(bucket, key, &mut body, options).await?;
        body.close();
        Ok(())
    }
}
