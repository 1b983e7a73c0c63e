//! Bounded fan-out over independent sessions
//!
//! Items are processed in consecutive chunks of at most `limit`. Every
//! future of a chunk is driven to completion before the next chunk starts,
//! so no more than `limit` sessions (and instances) are ever live at once.

use futures::future::join_all;
use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};
use vmpilot_error::{Error, Result};

pub struct FanOut {
    limit: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FanOut {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::config_invalid("fan-out limit must be at least 1")
                .with_operation("fanout::new")
                .with_context("limit", "0"));
        }
        Ok(Self {
            limit,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Highest number of futures observed running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Run `f` over every item, returning one slot per item in input order.
    ///
    /// A future that fails or panics leaves `None` in its slot.
    pub async fn run<T, R, E, F, Fut>(&self, items: Vec<T>, f: F) -> Vec<Option<R>>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: Display,
    {
        let total = items.len();
        let chunks = total.div_ceil(self.limit);
        let mut results = Vec::with_capacity(total);
        let mut items = items.into_iter().enumerate().peekable();
        let mut chunk = 0;

        while items.peek().is_some() {
            chunk += 1;
            let batch: Vec<_> = items.by_ref().take(self.limit).collect();
            info!(chunk, chunks, size = batch.len(), "processing batch");

            let futures = batch.into_iter().map(|(index, item)| self.track(index, f(index, item)));
            let batch_results = join_all(futures).await;
            let ok = batch_results.iter().filter(|r| r.is_some()).count();
            info!(chunk, chunks, ok, failed = batch_results.len() - ok, "completed batch");

            results.extend(batch_results);
        }

        results
    }

    async fn track<R, E, Fut>(&self, index: usize, fut: Fut) -> Option<R>
    where
        Fut: Future<Output = std::result::Result<R, E>>,
        E: Display,
    {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(index, error = %e, "session failed");
                None
            }
            Err(_) => {
                warn!(index, "session panicked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use vmpilot_error::ErrorKind;

    #[test]
    fn test_zero_limit_rejected() {
        let err = FanOut::new(0).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let fanout = FanOut::new(3).unwrap();
        let items: Vec<u64> = (0..7).collect();

        // later items finish first within each chunk
        let results = fanout
            .run(items, |_, n| async move {
                tokio::time::sleep(Duration::from_millis(30 - n * 4)).await;
                Ok::<_, Error>(n * 10)
            })
            .await;

        let expected: Vec<Option<u64>> = (0..7).map(|n| Some(n * 10)).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn test_chunks_are_sequential_and_bounded() {
        let fanout = FanOut::new(2).unwrap();
        let events = Mutex::new(Vec::new());

        fanout
            .run(vec!["a", "b", "c", "d", "e"], |index, name| {
                let events = &events;
                async move {
                    events.lock().unwrap().push(format!("start {}", name));
                    tokio::task::yield_now().await;
                    events.lock().unwrap().push(format!("end {}", name));
                    Ok::<_, Error>(index)
                }
            })
            .await;

        let events = events.into_inner().unwrap();
        let position = |e: &str| events.iter().position(|x| x == e).unwrap();
        assert!(position("end a") < position("start c"));
        assert!(position("end b") < position("start c"));
        assert!(position("end d") < position("start e"));
        assert_eq!(fanout.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_failures_and_panics_become_none() {
        let fanout = FanOut::new(4).unwrap();

        let results = fanout
            .run(vec![1, 2, 3, 4], |_, n| async move {
                match n {
                    2 => Err(Error::instance_failed("no capacity")),
                    3 => panic!("session crashed"),
                    _ => Ok(n),
                }
            })
            .await;

        assert_eq!(results, vec![Some(1), None, None, Some(4)]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let fanout = FanOut::new(2).unwrap();
        let results = fanout.run(Vec::<u8>::new(), |_, n| async move { Ok::<_, Error>(n) }).await;
        assert!(results.is_empty());
        assert_eq!(fanout.peak_in_flight(), 0);
    }
}
