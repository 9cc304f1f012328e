//! Fetch engine
//!
//! Drives a worklist of [`FetchItem`]s to completion. Every attempt is handed
//! to a classifier which decides whether the item is done (`Accept`/`Skip`) or
//! should be attempted again after a delay (`RetryAfter`).
//!
//! Concurrency is shared: simultaneous runs register with a [`Scheduler`] and
//! each gets `max(1, max_concurrent / runs)` active items, re-evaluated on
//! every dispatch pass. A retrying item stays active while it waits.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::{FetchItem, FetchOptions, FetchOutcome, FetchResponse, HttpTransport, Scheduler};

/// Fetch every item against the process-wide scheduler.
///
/// Returns once every item reached `Accept` or `Skip`. Results and failures are
/// recorded by `classify` into `context`.
pub async fn fetch<T, C, F>(
    transport: &T,
    items: Vec<FetchItem>,
    classify: F,
    context: &mut C,
    options: &FetchOptions,
) where
    T: HttpTransport + ?Sized,
    F: FnMut(&FetchItem, &FetchResponse, &mut C, &FetchOptions) -> FetchOutcome,
{
    fetch_with(Scheduler::global(), transport, items, classify, context, options).await
}

/// Same as [`fetch`], against an explicit scheduler
pub async fn fetch_with<T, C, F>(
    scheduler: &Scheduler,
    transport: &T,
    items: Vec<FetchItem>,
    mut classify: F,
    context: &mut C,
    options: &FetchOptions,
) where
    T: HttpTransport + ?Sized,
    F: FnMut(&FetchItem, &FetchResponse, &mut C, &FetchOptions) -> FetchOutcome,
{
    let mut guard = scheduler.register();
    let run_id = Uuid::new_v4();
    let max_concurrent = options.max_concurrent.max(1);
    let deadline = options.retry_budget.map(|budget| Instant::now() + budget);

    info!(
        run = %run_id,
        items = items.len(),
        runs = scheduler.runs(),
        "Fetch run started (budget: {:?})",
        options.retry_budget
    );

    let mut queue: VecDeque<usize> = (0..items.len()).collect();
    let mut in_flight = FuturesUnordered::new();
    let mut attempts = 0usize;

    while !queue.is_empty() || !in_flight.is_empty() {
        let effective = guard.effective_concurrency(max_concurrent);
        let room = effective.saturating_sub(in_flight.len());

        let mut started = 0;
        while started < room && !queue.is_empty() {
            if !guard.try_acquire(max_concurrent) {
                break;
            }
            let Some(idx) = queue.pop_front() else {
                guard.release();
                break;
            };
            in_flight.push(attempt(
                transport,
                &items[idx],
                idx,
                Duration::ZERO,
                deadline,
                options.request_timeout,
            ));
            started += 1;
        }
        attempts += started;

        debug!(
            run = %run_id,
            "Fetch pass: left={} active={} room={} started={}",
            queue.len(),
            in_flight.len(),
            room,
            started
        );

        let next_pass = Instant::now() + options.batch_delay;
        loop {
            tokio::select! {
                _ = sleep_until(next_pass) => break,
                Some((idx, response)) = in_flight.next(), if !in_flight.is_empty() => {
                    let item = &items[idx];
                    let outcome = classify(item, &response, context, options);
                    trace!(
                        run = %run_id,
                        uri = %item.uri,
                        status = response.status(),
                        "Attempt finished: {:?}",
                        outcome
                    );
                    match outcome {
                        FetchOutcome::RetryAfter(delay) => {
                            attempts += 1;
                            in_flight.push(attempt(
                                transport,
                                item,
                                idx,
                                delay,
                                deadline,
                                options.request_timeout,
                            ));
                        }
                        FetchOutcome::Accept | FetchOutcome::Skip => guard.release(),
                    }
                    if queue.is_empty() && in_flight.is_empty() {
                        break;
                    }
                }
            }
        }
    }

    info!(
        run = %run_id,
        items = items.len(),
        attempts,
        "Fetch run finished"
    );
}

/// One attempt of one item, after an optional retry delay
async fn attempt<T>(
    transport: &T,
    item: &FetchItem,
    idx: usize,
    delay: Duration,
    deadline: Option<Instant>,
    timeout: Duration,
) -> (usize, FetchResponse)
where
    T: HttpTransport + ?Sized,
{
    if !delay.is_zero() {
        sleep(delay).await;
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return (idx, FetchResponse::Expired);
    }
    (idx, transport.get(&item.uri, timeout).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{retry_after, ScriptedTransport};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn items(n: usize) -> Vec<FetchItem> {
        (0..n)
            .map(|i| FetchItem::new(&format!("https://api.test/items/{}", i)))
            .collect()
    }

    fn fast_options(max_concurrent: usize) -> FetchOptions {
        FetchOptions::default()
            .with_max_concurrent(max_concurrent)
            .with_batch_delay(Duration::from_millis(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_item_terminates() {
        let n = 12;
        for max_concurrent in 1..=n + 10 {
            let transport = ScriptedTransport::new().with_fallback(FetchResponse::http(200, "{}"));
            let scheduler = Scheduler::new();
            // Attempts per uri, then accepted count
            let mut state: (HashMap<String, usize>, usize) = (HashMap::new(), 0);

            // Every item is retried twice before it is accepted
            fetch_with(
                &scheduler,
                &transport,
                items(n),
                |item, _response, state: &mut (HashMap<String, usize>, usize), _options| {
                    let attempts = state.0.entry(item.uri.clone()).or_default();
                    *attempts += 1;
                    if *attempts < 3 {
                        return FetchOutcome::RetryAfter(Duration::from_millis(20));
                    }
                    state.1 += 1;
                    FetchOutcome::Accept
                },
                &mut state,
                &fast_options(max_concurrent),
            )
            .await;

            let (attempts, accepted) = state;
            assert_eq!(accepted, n, "max_concurrent={}", max_concurrent);
            assert_eq!(attempts.len(), n);
            assert!(attempts.values().all(|&c| c == 3));
            assert_eq!(transport.requests().len(), 3 * n);
            assert!(
                transport.max_active() <= max_concurrent,
                "max_active={} max_concurrent={}",
                transport.max_active(),
                max_concurrent
            );
            assert_eq!(scheduler.runs(), 0);
            assert_eq!(scheduler.in_flight(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_worklist() {
        let transport = ScriptedTransport::new();
        let mut calls = 0usize;
        fetch_with(
            &Scheduler::new(),
            &transport,
            Vec::new(),
            |_, _, calls: &mut usize, _| {
                *calls += 1;
                FetchOutcome::Accept
            },
            &mut calls,
            &fast_options(4),
        )
        .await;
        assert_eq!(calls, 0);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_runs_share_budget() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_latency(Duration::from_millis(50))
                .with_fallback(FetchResponse::http(200, "{}")),
        );
        let scheduler = Scheduler::new();
        let options = fast_options(10);

        let run = |prefix: &'static str| {
            let transport = transport.clone();
            let scheduler = scheduler.clone();
            let options = options.clone();
            async move {
                let items: Vec<FetchItem> = (0..30)
                    .map(|i| FetchItem::new(&format!("https://api.test/{}/{}", prefix, i)))
                    .collect();
                let mut done = 0usize;
                fetch_with(
                    &scheduler,
                    transport.as_ref(),
                    items,
                    |_, _, done: &mut usize, _| {
                        *done += 1;
                        FetchOutcome::Accept
                    },
                    &mut done,
                    &options,
                )
                .await;
                done
            }
        };

        let (a, b) = tokio::join!(run("a"), run("b"));
        assert_eq!(a, 30);
        assert_eq!(b, 30);
        assert!(transport.max_active() <= 10, "max active {}", transport.max_active());
        assert_eq!(scheduler.runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_item_waits_for_retry_after() {
        let uri = "https://api.test/items/0";
        let transport = ScriptedTransport::new().with_latency(Duration::ZERO);
        transport.script(
            uri,
            vec![
                FetchResponse::http(429, "").with_header("Retry-After", "2"),
                FetchResponse::http(200, "{}"),
            ],
        );

        let mut outcomes: Vec<i32> = Vec::new();
        fetch_with(
            &Scheduler::new(),
            &transport,
            vec![FetchItem::new(uri)],
            |_, response, outcomes: &mut Vec<i32>, _| {
                outcomes.push(response.status());
                if response.status() == 429 {
                    FetchOutcome::RetryAfter(retry_after(response, Duration::from_secs(5)))
                } else {
                    FetchOutcome::Accept
                }
            },
            &mut outcomes,
            &fast_options(4),
        )
        .await;

        assert_eq!(outcomes, vec![429, 200]);
        let times = transport.request_times(uri);
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_expires() {
        let transport = ScriptedTransport::new().with_fallback(FetchResponse::http(503, ""));
        let options = fast_options(4).with_retry_budget(Duration::from_secs(3));

        let mut statuses: Vec<i32> = Vec::new();
        fetch_with(
            &Scheduler::new(),
            &transport,
            items(3),
            |_, response, statuses: &mut Vec<i32>, _| {
                statuses.push(response.status());
                match response {
                    FetchResponse::Expired => FetchOutcome::Skip,
                    _ => FetchOutcome::RetryAfter(Duration::from_secs(1)),
                }
            },
            &mut statuses,
            &options,
        )
        .await;

        assert_eq!(statuses.iter().filter(|&&s| s == -1).count(), 3);
        assert!(statuses.iter().filter(|&&s| s == 503).count() >= 3);
        // No request is made once the budget is gone
        assert_eq!(transport.requests().len(), statuses.len() - 3);
    }
}
