use std::io::SeekFrom;
use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::progress::{report, Progress};

/// Bounded, seekable view over one region of a file.
///
/// Each reader opens its own handle so concurrent part uploads never share a
/// file cursor. The region is `[start, start + len)` where `len` is `max_len`
/// clipped to the end of the file; reads never cross it.
///
/// Progress is reported through an optional sink, once per read with the
/// number of bytes just read. Seeking reports the signed distance moved, so
/// rewinding and re-reading a body nets out to zero. An
/// [`ObjectStore`](crate::ObjectStore) that reads the body for its own
/// purposes (hashing, internal retries) should [`disable_callback`] while doing
/// so.
///
/// [`disable_callback`]: ChunkReader::disable_callback
#[derive(Debug)]
pub struct ChunkReader {
    file: File,
    start: u64,
    len: u64,
    amount_read: u64,
    callback: Option<Progress>,
    callback_enabled: bool,
}

impl ChunkReader {
    /// Open `path` and position a reader at `start`, covering at most `max_len` bytes
    pub async fn open(
        path: impl AsRef<Path>,
        start: u64,
        max_len: u64,
        callback: Option<Progress>,
    ) -> std::io::Result<Self> {
        let mut file = File::open(path.as_ref()).await?;
        let file_size = file.metadata().await?.len();
        let len = max_len.min(file_size.saturating_sub(start));
        file.seek(SeekFrom::Start(start)).await?;

        Ok(Self {
            file,
            start,
            len,
            amount_read: 0,
            callback,
            callback_enabled: true,
        })
    }

    /// Open a reader over the whole file
    pub async fn open_whole(
        path: impl AsRef<Path>,
        callback: Option<Progress>,
    ) -> std::io::Result<Self> {
        Self::open(path, 0, u64::MAX, callback).await
    }

    /// Read up to `n` bytes. Returns an empty buffer at the end of the region.
    pub async fn read(&mut self, n: usize) -> std::io::Result<Bytes> {
        let to_read = (n as u64).min(self.remaining());
        if to_read == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = Vec::with_capacity(to_read as usize);
        (&mut self.file).take(to_read).read_to_end(&mut buf).await?;
        self.amount_read += buf.len() as u64;

        if self.callback_enabled {
            report(self.callback.as_ref(), buf.len() as i64);
        }
        Ok(Bytes::from(buf))
    }

    /// Read everything left in the region
    pub async fn read_to_end(&mut self) -> std::io::Result<Bytes> {
        let remaining = self.remaining() as usize;
        self.read(remaining).await
    }

    /// Move to `offset` bytes past the region start (clamped to the region end)
    pub async fn seek(&mut self, offset: u64) -> std::io::Result<()> {
        let offset = offset.min(self.len);
        self.file.seek(SeekFrom::Start(self.start + offset)).await?;

        if self.callback_enabled {
            report(
                self.callback.as_ref(),
                offset as i64 - self.amount_read as i64,
            );
        }
        self.amount_read = offset;
        Ok(())
    }

    /// Current position relative to the region start
    pub fn tell(&self) -> u64 {
        self.amount_read
    }

    /// Logical length of the region
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> u64 {
        self.len - self.amount_read
    }

    /// Absolute offset of the region in the file
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn enable_callback(&mut self) {
        self.callback_enabled = true;
    }

    pub fn disable_callback(&mut self) {
        self.callback_enabled = false;
    }

    pub fn callback_enabled(&self) -> bool {
        self.callback_enabled
    }

    /// Release the file handle
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProgressCounter;
    use std::io::Write;
    use std::sync::Arc;

    fn sample_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn reads_stay_inside_region() {
        let file = sample_file(100);
        let mut reader = ChunkReader::open(file.path(), 10, 20, None).await.unwrap();

        assert_eq!(reader.len(), 20);
        let first = reader.read(15).await.unwrap();
        assert_eq!(first.len(), 15);
        assert_eq!(first[0], 10);

        let second = reader.read(15).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second[4], 29);

        let past_end = reader.read(15).await.unwrap();
        assert!(past_end.is_empty());
        assert_eq!(reader.tell(), 20);
    }

    #[tokio::test]
    async fn last_region_is_clipped_to_file() {
        let file = sample_file(100);
        let mut reader = ChunkReader::open(file.path(), 90, 20, None).await.unwrap();

        assert_eq!(reader.len(), 10);
        assert_eq!(reader.read_to_end().await.unwrap().len(), 10);

        let beyond = ChunkReader::open(file.path(), 200, 20, None).await.unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn rewind_does_not_double_count() {
        let file = sample_file(64);
        let counter = ProgressCounter::new();
        let mut reader = ChunkReader::open(file.path(), 0, 64, Some(counter.clone() as Progress))
            .await
            .unwrap();

        let first = reader.read_to_end().await.unwrap();
        assert_eq!(counter.total(), 64);

        reader.seek(0).await.unwrap();
        assert_eq!(counter.total(), 0);

        let again = reader.read_to_end().await.unwrap();
        assert_eq!(first, again);
        assert_eq!(counter.total(), 64);
    }

    #[tokio::test]
    async fn disabled_callback_keeps_position() {
        let file = sample_file(32);
        let counter = ProgressCounter::new();
        let mut reader = ChunkReader::open(file.path(), 0, 32, Some(counter.clone() as Progress))
            .await
            .unwrap();

        reader.disable_callback();
        reader.read(16).await.unwrap();
        reader.seek(0).await.unwrap();
        assert_eq!(counter.total(), 0);
        assert_eq!(reader.tell(), 0);

        reader.enable_callback();
        reader.read(8).await.unwrap();
        assert_eq!(counter.total(), 8);
        assert_eq!(reader.remaining(), 24);
    }

    #[tokio::test]
    async fn callback_gets_per_read_amounts() {
        let file = sample_file(10);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink: Progress = {
            let seen = seen.clone();
            Arc::new(move |bytes: i64| seen.lock().push(bytes))
        };
        let mut reader = ChunkReader::open_whole(file.path(), Some(sink)).await.unwrap();

        reader.read(4).await.unwrap();
        reader.read(4).await.unwrap();
        reader.read(4).await.unwrap();
        reader.read(4).await.unwrap();

        assert_eq!(*seen.lock(), vec![4, 4, 2]);
    }
}
