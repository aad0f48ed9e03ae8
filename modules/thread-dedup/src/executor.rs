use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{stream, StreamExt};

/// Result of running the worker on one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T, R, E> {
    pub item: T,
    pub result: Result<R, E>,
}

/// Run `worker` over `items` with at most `concurrency` calls in flight.
///
/// Items are pulled from the input only when a slot frees up, so once
/// `cancel` is set nothing new is started while in-flight work drains.
/// Worker errors are captured in the item's [`Outcome`]; they never stop
/// sibling items. `on_complete` sees every outcome as it lands, in
/// completion order, which is unspecified.
pub async fn run_bounded<T, R, E, W, Fut, C>(
    items: Vec<T>,
    concurrency: usize,
    cancel: Arc<AtomicBool>,
    worker: W,
    mut on_complete: C,
) -> Vec<Outcome<T, R, E>>
where
    T: Clone,
    W: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    C: FnMut(&Outcome<T, R, E>),
{
    let worker = &worker;
    let pending = items
        .into_iter()
        .take_while(|_| !cancel.load(Ordering::SeqCst))
        .map(|item| async move {
            let result = worker(item.clone()).await;
            Outcome { item, result }
        });

    let mut in_flight = stream::iter(pending).buffer_unordered(concurrency.max(1));
    let mut outcomes = Vec::new();
    while let Some(outcome) = in_flight.next().await {
        on_complete(&outcome);
        outcomes.push(outcome);
    }
    outcomes
}
