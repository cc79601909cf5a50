use std::io::SeekFrom;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::progress::report;
use crate::retry::{retry_part, Attempt};
use crate::types::plan_ranges;
use crate::{
    CooperativeQueue, DownloadRange, ObjectStore, PoolTask, Progress, StoreError,
    TransferConfig, TransferError, TransferOptions, TransferResult, WorkerPool, WriteMessage,
    WriteTask,
};

type WriteQueue = CooperativeQueue<WriteMessage>;

/// Downloads an object with concurrent ranged reads.
///
/// Fetch tasks run on the worker pool and push [`WriteTask`]s into a bounded
/// queue. A single writer task owns the destination file and applies them at
/// their absolute offsets, so parts may arrive in any order.
pub struct MultipartDownloader<S, P> {
    store: Arc<S>,
    pool: Arc<P>,
    config: TransferConfig,
}

impl<S, P> MultipartDownloader<S, P>
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

    /// Download `object_size` bytes of `bucket/key` into `destination`,
    /// creating or truncating it.
    #[instrument(skip(self, destination, options, progress), fields(destination = %destination.display()))]
    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        object_size: u64,
        options: &TransferOptions,
        progress: Option<Progress>,
    ) -> TransferResult<()> {
        let ranges = plan_ranges(object_size, self.config.part_size);
        debug!(parts = ranges.len(), "Planned ranged download");

        let file = File::create(destination).await?;
        let queue = Arc::new(WriteQueue::new(self.config.max_queued_writes));
        let writer = tokio::spawn(write_loop(file, queue.clone()));

        let fetch = RangeFetch {
            store: self.store.clone(),
            queue: queue.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            options: Arc::new(options.clone()),
            progress,
            io_chunk_size: self.config.io_chunk_size,
        };
        let failed = Arc::new(AtomicBool::new(false));
        let max_attempts = self.config.max_download_attempts;

        let tasks: Vec<PoolTask<()>> = ranges
            .into_iter()
            .map(|range| {
                let fetch = fetch.clone();
                let failed = failed.clone();
                async move {
                    if failed.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    let result = retry_part(range.part_index, max_attempts, |attempt| {
                        fetch.attempt(range, attempt)
                    })
                    .await;
                    if result.is_err() {
                        failed.store(true, Ordering::Release);
                    }
                    result
                }
                .boxed()
            })
            .collect();

        let mut fetch_error = None;
        let mut shutdown_echo = None;
        for result in self.pool.run_all(tasks).await {
            match result {
                Ok(()) => {}
                Err(e) if e.is_queue_shutdown() => {
                    shutdown_echo.get_or_insert(e);
                }
                Err(e) => {
                    fetch_error.get_or_insert(e);
                }
            }
        }

        // The writer may already have shut the queue down after a failed write
        if queue.enqueue(WriteMessage::Close).await.is_err() {
            debug!("Write queue already shut down");
        }
        let writer_result = writer
            .await
            .unwrap_or_else(|e| Err(TransferError::worker(e.to_string())));

        if let Some(e) = fetch_error {
            return Err(e);
        }
        writer_result?;
        if let Some(e) = shutdown_echo {
            return Err(e);
        }

        info!(object_size, "Completed ranged download");
        Ok(())
    }

    /// Download the whole object in one request, retried like a single part.
    ///
    /// `expected_size` comes from a prior metadata lookup; a shorter body is an
    /// incomplete read and a longer one a service error.
    #[instrument(skip(self, destination, options, progress), fields(destination = %destination.display()))]
    pub async fn download_whole(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        expected_size: u64,
        options: &TransferOptions,
        progress: Option<Progress>,
    ) -> TransferResult<()> {
        retry_part(0, self.config.max_download_attempts, |attempt| {
            let progress = progress.clone();
            async move {
                debug!(attempt, "Fetching whole object");
                let mut reported = 0i64;
                let result = self
                    .fetch_whole(
                        bucket,
                        key,
                        destination,
                        expected_size,
                        options,
                        progress.as_ref(),
                        &mut reported,
                    )
                    .await;
                if result.is_err() {
                    report(progress.as_ref(), -reported);
                }
                Attempt::from_result(result)
            }
        })
        .await?;

        info!(expected_size, "Completed single-request download");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_whole(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        expected_size: u64,
        options: &TransferOptions,
        progress: Option<&Progress>,
        reported: &mut i64,
    ) -> TransferResult<()> {
        let mut body = self.store.get_object(bucket, key, None, options).await?;
        let mut file = File::create(destination).await?;
        let mut received = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            if received > expected_size {
                return Err(StoreError::service(format!(
                    "{}/{} returned more than {} bytes",
                    bucket, key, expected_size
                ))
                .into());
            }
            file.write_all(&chunk).await?;
            report(progress, chunk.len() as i64);
            *reported += chunk.len() as i64;
        }
        file.flush().await?;

        if received < expected_size {
            return Err(StoreError::IncompleteRead {
                expected: expected_size,
                received,
            }
            .into());
        }
        Ok(())
    }
}

/// Shared state of the fetch tasks of one download
struct RangeFetch<S> {
    store: Arc<S>,
    queue: Arc<WriteQueue>,
    bucket: String,
    key: String,
    options: Arc<TransferOptions>,
    progress: Option<Progress>,
    io_chunk_size: usize,
}

impl<S> Clone for RangeFetch<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            queue: self.queue.clone(),
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            options: self.options.clone(),
            progress: self.progress.clone(),
            io_chunk_size: self.io_chunk_size,
        }
    }
}

impl<S: ObjectStore> RangeFetch<S> {
    async fn attempt(&self, range: DownloadRange, attempt: u32) -> Attempt<()> {
        debug!(part_index = range.part_index, attempt, range = %range.byte_range(), "Fetching range");
        let mut reported = 0i64;
        let result = self.stream_range(range, &mut reported).await;
        if result.is_err() {
            report(self.progress.as_ref(), -reported);
        }
        Attempt::from_result(result)
    }

    /// Fetch `range` and queue it for the writer in `io_chunk_size` pieces
    async fn stream_range(&self, range: DownloadRange, reported: &mut i64) -> TransferResult<()> {
        let mut body = self
            .store
            .get_object(&self.bucket, &self.key, Some(range.byte_range()), &self.options)
            .await?;

        let expected = range.len();
        let mut offset = range.start;
        let mut received = 0u64;
        let mut pending = BytesMut::new();

        while let Some(chunk) = body.next().await {
            let mut chunk = chunk?;
            received += chunk.len() as u64;
            if received > expected {
                return Err(StoreError::service(format!(
                    "range {} returned more than {} bytes",
                    range.byte_range(),
                    expected
                ))
                .into());
            }

            if !pending.is_empty() {
                let take = (self.io_chunk_size - pending.len()).min(chunk.len());
                pending.extend_from_slice(&chunk.split_to(take));
                if pending.len() < self.io_chunk_size {
                    continue;
                }
                let data = std::mem::take(&mut pending).freeze();
                self.queue_write(&mut offset, data, reported).await?;
            }

            // Whole pieces are handed over without copying
            while chunk.len() >= self.io_chunk_size {
                let data = chunk.split_to(self.io_chunk_size);
                self.queue_write(&mut offset, data, reported).await?;
            }
            pending.extend_from_slice(&chunk);
        }

        if !pending.is_empty() {
            self.queue_write(&mut offset, pending.freeze(), reported).await?;
        }

        if received < expected {
            return Err(StoreError::IncompleteRead { expected, received }.into());
        }
        Ok(())
    }

    async fn queue_write(&self, offset: &mut u64, data: Bytes, reported: &mut i64) -> TransferResult<()> {
        let len = data.len();
        self.queue
            .enqueue(WriteMessage::Write(WriteTask {
                offset: *offset,
                data,
            }))
            .await?;

        report(self.progress.as_ref(), len as i64);
        *reported += len as i64;
        *offset += len as u64;
        Ok(())
    }
}

/// Apply queued writes until the `Close` sentinel arrives.
///
/// A failed write shuts the queue down so producers stop instead of filling
/// a queue nobody drains.
async fn write_loop(mut file: File, queue: Arc<WriteQueue>) -> TransferResult<()> {
    loop {
        match queue.dequeue().await {
            WriteMessage::Write(task) => {
                if let Err(e) = write_at(&mut file, &task).await {
                    warn!(offset = task.offset, "Write failed, shutting down write queue: {}", e);
                    queue.shutdown();
                    return Err(e.into());
                }
            }
            WriteMessage::Close => break,
        }
    }

    Ok(())
}

async fn write_at(file: &mut File, task: &WriteTask) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(task.offset)).await?;
    file.write_all(&task.data).await?;
    // Surfaces errors of the write just handed to the blocking pool
    file.flush().await
}
