use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Receives byte-count deltas while a transfer runs.
///
/// Calls arrive from many part tasks at once, so implementations must be
/// thread-safe; that is the caller's obligation, the engine adds no locking of
/// its own. Deltas are usually positive. A negative delta withdraws bytes that
/// were reported for data about to be sent or fetched again (a rewound
/// [`ChunkReader`](crate::ChunkReader) or a retried download part).
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, bytes: i64);
}

impl<F> ProgressSink for F
where
    F: Fn(i64) + Send + Sync,
{
    fn on_progress(&self, bytes: i64) {
        self(bytes)
    }
}

impl std::fmt::Debug for dyn ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// Shared handle to a progress sink
pub type Progress = Arc<dyn ProgressSink>;

/// Lock-free running total of transferred bytes
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: AtomicI64,
}

impl ProgressCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Net bytes reported so far
    pub fn total(&self) -> i64 {
        self.total.load(Ordering::Acquire)
    }

    /// Net progress as a percentage of `size` (100 for empty objects)
    pub fn percentage(&self, size: u64) -> f64 {
        if size == 0 {
            return 100.0;
        }
        (self.total().max(0) as f64 / size as f64) * 100.0
    }
}

impl ProgressSink for ProgressCounter {
    fn on_progress(&self, bytes: i64) {
        self.total.fetch_add(bytes, Ordering::AcqRel);
    }
}

pub(crate) fn report(progress: Option<&Progress>, bytes: i64) {
    if bytes == 0 {
        return;
    }
    if let Some(sink) = progress {
        sink.on_progress(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_sums_signed_deltas() {
        let counter = ProgressCounter::new();
        counter.on_progress(100);
        counter.on_progress(50);
        counter.on_progress(-50);
        assert_eq!(counter.total(), 100);
        assert_eq!(counter.percentage(400), 25.0);
        assert_eq!(counter.percentage(0), 100.0);
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink: Progress = {
            let seen = seen.clone();
            Arc::new(move |bytes: i64| seen.lock().push(bytes))
        };

        report(Some(&sink), 10);
        report(Some(&sink), 0);
        report(None, 5);

        assert_eq!(*seen.lock(), vec![10]);
    }
}
