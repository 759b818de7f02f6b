//! Advisory request pacing.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Spaces requests so an agent stays under its requests-per-minute ceiling.
#[derive(Debug)]
pub struct RequestPacer {
    interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Pace to at most `per_minute` requests. `None` or zero disables pacing.
    pub fn new(per_minute: Option<u32>) -> Self {
        let interval = per_minute
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_secs_f64(60.0 / rpm as f64));
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// A pacer that never waits.
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Wait until the next request is allowed, then claim the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let (Some(interval), Some(previous)) = (self.interval, *last) {
            let ready_at = previous + interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
