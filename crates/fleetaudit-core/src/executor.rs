//! Bounded-concurrency map with order-preserving results.
//!
//! `min(concurrency, items.len())` tokio tasks share a work queue; each task
//! loops "claim next item, run the worker, record the result at the item's
//! original index" until the queue is empty. The output vector always lines
//! up index-for-index with the input, regardless of completion order.
//!
//! The executor retries nothing and swallows nothing: workers are infallible
//! by contract, so partial failure lives in the worker's return value. The
//! only error surfaced here is a task panic.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::error::{AuditError, Result};

/// Map `items` through `worker` with at most `concurrency` tasks in flight.
///
/// `result[i]` corresponds to `items[i]`. A `concurrency` of 0 is clamped
/// to 1.
pub async fn map_bounded<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    worker: F,
) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let concurrency = concurrency.max(1).min(total);

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> =
        Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let worker = Arc::new(worker);

    let mut join_set = JoinSet::new();
    for _ in 0..concurrency {
        let queue = Arc::clone(&queue);
        let worker = Arc::clone(&worker);
        join_set.spawn(async move {
            let mut produced = Vec::new();
            loop {
                let next = queue.lock().await.pop_front();
                let Some((index, item)) = next else { break };
                let result = worker(item, index).await;
                produced.push((index, result));
            }
            produced
        });
    }

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(joined) = join_set.join_next().await {
        let produced = joined.map_err(|e| AuditError::TaskJoin(e.to_string()))?;
        for (index, result) in produced {
            slots[index] = Some(result);
        }
    }

    let mut results = Vec::with_capacity(total);
    for (index, slot) in slots.into_iter().enumerate() {
        results.push(
            slot.ok_or_else(|| AuditError::TaskJoin(format!("missing result for index {index}")))?,
        );
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_empty_input_yields_empty_output() {
        let results: Vec<u32> = map_bounded(Vec::<u32>::new(), 4, |item, _| async move { item })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_output_matches_sequential_for_every_concurrency() {
        let items: Vec<usize> = (0..8).collect();
        let expected: Vec<usize> = items.iter().map(|i| i * 10).collect();

        for concurrency in 1..=items.len() {
            let results = map_bounded(items.clone(), concurrency, |item, _| async move {
                // Later items finish first to stress the ordering guarantee.
                sleep(Duration::from_millis((8 - item as u64) * 5)).await;
                item * 10
            })
            .await
            .unwrap();
            assert_eq!(results, expected, "concurrency {concurrency}");
        }
    }

    #[tokio::test]
    async fn test_worker_receives_originating_index() {
        let items = vec!["a", "b", "c"];
        let results = map_bounded(items, 2, |item, index| async move {
            format!("{index}:{item}")
        })
        .await
        .unwrap();
        assert_eq!(results, vec!["0:a", "1:b", "2:c"]);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_ceiling() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..10).collect();
        let in_flight_c = Arc::clone(&in_flight);
        let max_c = Arc::clone(&max_in_flight);
        map_bounded(items, 3, move |_, _| {
            let in_flight = Arc::clone(&in_flight_c);
            let max_in_flight = Arc::clone(&max_c);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

        let observed = max_in_flight.load(Ordering::SeqCst);
        assert!(observed <= 3, "max in flight was {observed}");
        assert!(observed > 1, "expected actual concurrency, got {observed}");
    }

    #[tokio::test]
    async fn test_concurrency_zero_is_clamped_to_one() {
        let results = map_bounded(vec![1, 2, 3], 0, |item, _| async move { item * 2 })
            .await
            .unwrap();
        assert_eq!(results, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_worker_panic_surfaces_as_join_error() {
        let result = map_bounded(vec![1, 2], 2, |item, _| async move {
            if item == 2 {
                panic!("boom");
            }
            item
        })
        .await;
        assert!(matches!(result, Err(AuditError::TaskJoin(_))));
    }
}
