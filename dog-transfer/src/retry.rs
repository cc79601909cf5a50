use std::future::Future;

use tracing::{debug, warn};

use crate::{StoreError, TransferError, TransferResult};

/// Outcome of a single attempt at a part
#[derive(Debug)]
pub enum Attempt<T> {
    /// The part finished
    Done(T),
    /// Worth another try, if attempts remain
    Transient(StoreError),
    /// Give up on the whole transfer
    Fatal(TransferError),
}

impl<T> Attempt<T> {
    /// Sort a store result into done / transient / fatal
    pub fn from_store(result: Result<T, StoreError>) -> Self {
        Self::from_result(result.map_err(TransferError::from))
    }

    /// Like [`from_store`](Attempt::from_store), for work that can also fail
    /// outside the store. Only transient store errors are retried.
    pub fn from_result(result: TransferResult<T>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(TransferError::Store { source }) if source.is_transient() => {
                Attempt::Transient(source)
            }
            Err(e) => Attempt::Fatal(e),
        }
    }
}

/// Run `attempt` until it is done, fails fatally, or `max_attempts` transient
/// failures have been seen, in which case the last one is reported as
/// [`TransferError::RetriesExceeded`].
pub async fn retry_part<T, F, Fut>(
    part_index: u64,
    max_attempts: u32,
    mut attempt: F,
) -> TransferResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut number = 1;
    loop {
        match attempt(number).await {
            Attempt::Done(value) => {
                if number > 1 {
                    debug!(part_index, attempts = number, "Part succeeded after retry");
                }
                return Ok(value);
            }
            Attempt::Fatal(e) => return Err(e),
            Attempt::Transient(e) if number >= max_attempts => {
                return Err(TransferError::RetriesExceeded {
                    part_index,
                    attempts: number,
                    source: e,
                });
            }
            Attempt::Transient(e) => {
                warn!(part_index, attempt = number, max_attempts, "Retrying part: {}", e);
                number += 1;
            }
        }
    }
}
