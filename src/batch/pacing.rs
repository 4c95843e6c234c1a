use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum spacing between consecutive requests to one backend.
///
/// The earliest time the next request may go out is kept behind a mutex;
/// each caller reserves a slot under the lock and sleeps outside of it, so
/// concurrent rounds queue up instead of firing at once.
#[derive(Debug)]
pub struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Minimum spacing between two dispatches.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reserve the next free dispatch slot and advance the clock past it.
    pub async fn reserve(&self) -> Instant {
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        let slot = match *next_slot {
            Some(next) if next > now => next,
            _ => now,
        };
        *next_slot = Some(slot + self.interval);
        slot
    }

    /// Wait until this caller is allowed to send.
    pub async fn wait_turn(&self) {
        let slot = self.reserve().await;
        let delay = slot.saturating_duration_since(Instant::now());
        if !delay.is_zero() {
            debug!("Pacing request by {}ms", delay.as_millis());
            tokio::time::sleep_until(slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_secs(10));
        let before = Instant::now();
        pacer.wait_turn().await;
        assert!(before.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_slots_are_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(100));
        let first = pacer.reserve().await;
        let second = pacer.reserve().await;
        let third = pacer.reserve().await;
        assert!(second - first >= Duration::from_millis(100));
        assert!(third - second >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_concurrent_waiters_are_serialized() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_millis(40)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pacer = pacer.clone();
                tokio::spawn(async move {
                    pacer.wait_turn().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        // four slots spaced 40ms apart: the last one is at least 120ms out
        assert!(times[3] - start >= Duration::from_millis(120));
    }
}
