use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Shared spacing budget for outbound platform requests.
///
/// Clones share one limiter, so concurrent workers together never issue
/// requests closer than `interval` apart.
#[derive(Clone, Debug)]
pub struct Throttle {
    limiter: Arc<Mutex<IntervalLimiter>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: Arc::new(Mutex::new(IntervalLimiter::new(interval))),
        }
    }

    /// Wait until the next request slot.
    pub async fn wait(&self) {
        let wait = { self.limiter.lock().await.reserve() };
        if wait > Duration::from_millis(0) {
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_consecutive_requests() {
        let throttle = Throttle::new(Duration::from_millis(500));
        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_the_budget() {
        let a = Throttle::new(Duration::from_millis(200));
        let b = a.clone();
        let start = Instant::now();
        a.wait().await;
        b.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let throttle = Throttle::new(Duration::ZERO);
        for _ in 0..100 {
            throttle.wait().await;
        }
    }
}
