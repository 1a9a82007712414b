use crate::{NscmError, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `work` over `items` with at most `limit` calls in flight.
///
/// Results come back in input order. The first error ends the batch:
/// queued items are never started and the error is returned. Tasks that
/// were already spawned run to completion in the background; their output
/// is dropped.
pub async fn bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, work: F) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let total = items.len();
    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();

    let mut pending = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let handle = tokio::spawn(work(item));
            async move { (index, handle.await) }
        })
        .buffer_unordered(limit.max(1));

    while let Some((index, joined)) = pending.next().await {
        let value = joined.map_err(|err| NscmError::Task {
            reason: err.to_string(),
        })??;
        slots[index] = Some(value);
    }

    Ok(slots.into_iter().flatten().collect())
}
