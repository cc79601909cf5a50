use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ByteRange, CompletedPart};

/// State of one multipart upload, owned by the orchestrating task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

impl UploadSession {
    pub fn new<B: Into<String>, K: Into<String>, U: Into<String>>(
        bucket: B,
        key: K,
        upload_id: U,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
            parts: Vec::new(),
        }
    }

    /// Record a finished part; parts may arrive in any order
    pub fn record_part(&mut self, part: CompletedPart) {
        self.parts.push(part);
    }

    /// Parts in ascending part-number order, as completion requires
    pub fn completed_parts(&self) -> Vec<CompletedPart> {
        let mut parts = self.parts.clone();
        parts.sort_by_key(|p| p.part_number);
        parts
    }
}

/// One ranged read of a multipart download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRange {
    pub part_index: u64,
    pub start: u64,
    pub end: u64,
}

impl DownloadRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Planned ranges always cover at least one byte
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn byte_range(&self) -> ByteRange {
        ByteRange::new(self.start, self.end)
    }
}

/// Split `[0, object_size)` into inclusive ranges of at most `part_size` bytes
pub fn plan_ranges(object_size: u64, part_size: u64) -> Vec<DownloadRange> {
    if object_size == 0 || part_size == 0 {
        return Vec::new();
    }

    let num_parts = object_size.div_ceil(part_size);
    if num_parts == 1 {
        return vec![DownloadRange {
            part_index: 0,
            start: 0,
            end: object_size - 1,
        }];
    }

    (0..num_parts)
        .map(|part_index| {
            let start = part_index * part_size;
            let end = (start + part_size).min(object_size) - 1;
            DownloadRange {
                part_index,
                start,
                end,
            }
        })
        .collect()
}

/// Bytes to write at an absolute offset of the destination file
#[derive(Debug, Clone)]
pub struct WriteTask {
    pub offset: u64,
    pub data: Bytes,
}

/// Messages consumed by the download writer
#[derive(Debug)]
pub enum WriteMessage {
    Write(WriteTask),
    /// No more writes follow; the writer exits after this one
    Close,
}
