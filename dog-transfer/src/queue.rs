use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::{TransferError, TransferResult};

/// Bounded FIFO that producers can be locked out of.
///
/// `enqueue` waits while the queue is full. Once [`shutdown`] has been called
/// every enqueue, including ones already waiting for room, fails with
/// [`TransferError::QueueShutdown`]. Shutdown does not drain: items accepted
/// before it are still handed out by `dequeue`, and consumers are expected to
/// stop on their own sentinel rather than on the shutdown flag.
///
/// [`shutdown`]: CooperativeQueue::shutdown
pub struct CooperativeQueue<T> {
    state: Mutex<QueueState<T>>,
    slots: Semaphore,
    available: Notify,
    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    shutdown: bool,
}

impl<T: Send> CooperativeQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                shutdown: false,
            }),
            slots: Semaphore::new(capacity),
            available: Notify::new(),
            capacity,
        }
    }

    /// Add an item, waiting for room if the queue is full
    pub async fn enqueue(&self, item: T) -> TransferResult<()> {
        if self.is_shutdown() {
            return Err(TransferError::QueueShutdown);
        }

        // A closed semaphore means shutdown happened while we waited
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| TransferError::QueueShutdown)?;

        let mut state = self.state.lock();
        if state.shutdown {
            return Err(TransferError::QueueShutdown);
        }
        permit.forget();
        state.items.push_back(item);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Take the next item, waiting until one is available
    pub async fn dequeue(&self) -> T {
        loop {
            let notified = self.available.notified();
            if let Some(item) = self.try_dequeue() {
                return item;
            }
            notified.await;
        }
    }

    /// Take the next item if one is queued
    pub fn try_dequeue(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.slots.add_permits(1);
        }
        item
    }

    /// Reject all further enqueues. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.slots.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
