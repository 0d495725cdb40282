//! Rate-limited call gate for the reasoning service.
//!
//! Every reasoning-service invocation — batch classification and
//! structured extraction alike — runs through one shared gate so the
//! aggregate call rate stays inside the upstream provider's limit no
//! matter how many batches are processing concurrently.
//!
//! The gate enforces two independent bounds:
//! - a concurrency ceiling (max simultaneous in-flight calls), and
//! - a sliding-window rate cap (max N call starts per interval).
//!
//! Queued callers are served in FIFO order (tokio's semaphore is fair).

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::trace;

use finbox_core::defaults::{GATE_CONCURRENCY, GATE_INTERVAL_CAP, GATE_INTERVAL_MS};

/// Concurrency- and rate-bounded gate for external calls.
pub struct CallGate {
    semaphore: Semaphore,
    /// Start times of calls within the current window, oldest first.
    starts: Mutex<VecDeque<Instant>>,
    interval: Duration,
    interval_cap: usize,
    /// Calls admitted but not yet started.
    waiting: AtomicUsize,
}

impl CallGate {
    /// Create a gate with explicit limits.
    pub fn new(concurrency: usize, interval: Duration, interval_cap: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Semaphore::new(concurrency.max(1)),
            starts: Mutex::new(VecDeque::new()),
            interval,
            interval_cap: interval_cap.max(1),
            waiting: AtomicUsize::new(0),
        })
    }

    /// Gate with the system defaults.
    pub fn with_defaults() -> Arc<Self> {
        Self::new(
            GATE_CONCURRENCY,
            Duration::from_millis(GATE_INTERVAL_MS),
            GATE_INTERVAL_CAP,
        )
    }

    /// Number of calls queued behind the gate, waiting to start.
    pub fn depth(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    /// Run a call through the gate.
    ///
    /// Waits for a concurrency slot, then for a rate-window slot, then
    /// drives the future to completion. The output is returned verbatim.
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        self.waiting.fetch_add(1, Ordering::Relaxed);

        // Closed-semaphore can't happen: the gate never closes it.
        let permit = self.semaphore.acquire().await.ok();

        // Rate window: admit at most interval_cap starts per interval.
        loop {
            let now = Instant::now();
            let mut starts = self.starts.lock().await;
            while let Some(front) = starts.front() {
                if now.duration_since(*front) >= self.interval {
                    starts.pop_front();
                } else {
                    break;
                }
            }
            if starts.len() < self.interval_cap {
                starts.push_back(now);
                break;
            }
            let wait = self.interval - now.duration_since(*starts.front().unwrap_or(&now));
            drop(starts);
            trace!(wait_ms = wait.as_millis() as u64, "gate rate window full");
            tokio::time::sleep(wait).await;
        }

        self.waiting.fetch_sub(1, Ordering::Relaxed);
        let out = fut.await;
        drop(permit);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_depth_starts_at_zero() {
        let gate = CallGate::new(2, Duration::from_millis(100), 10);
        assert_eq!(gate.depth(), 0);
    }

    #[tokio::test]
    async fn test_passthrough_result() {
        let gate = CallGate::new(1, Duration::from_millis(1), 10);
        let out = gate.run(async { 41 + 1 }).await;
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling() {
        let gate = CallGate::new(2, Duration::from_millis(1), 100);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                gate.run(async {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_interval_cap_spaces_starts() {
        let gate = CallGate::new(8, Duration::from_millis(50), 2);
        let start = std::time::Instant::now();
        for _ in 0..5 {
            gate.run(async {}).await;
        }
        // 5 starts at 2 per 50ms window needs at least two extra windows.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_fifo_ordering() {
        let gate = CallGate::new(1, Duration::from_millis(1), 100);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5u32 {
            let gate = gate.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                gate.run(async {
                    order.lock().await.push(i);
                })
                .await;
            }));
            // Give each task time to enqueue before the next spawns.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_depth_reflects_queued_calls() {
        let gate = CallGate::new(1, Duration::from_millis(1), 100);
        let blocker = gate.clone();
        let handle = tokio::spawn(async move {
            blocker
                .run(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                })
                .await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let queued = gate.clone();
        let queued_handle = tokio::spawn(async move {
            queued.run(async {}).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(gate.depth() >= 1);

        handle.await.unwrap();
        queued_handle.await.unwrap();
        assert_eq!(gate.depth(), 0);
    }
}
