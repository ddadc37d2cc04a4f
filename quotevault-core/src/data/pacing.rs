//! Injectable waiting.
//!
//! Every suspension in the pipeline (call pacing, symbol pacing, retry backoff,
//! cooldown waits) goes through a [`Sleeper`], so tests can assert the exact
//! wait sequence without actually waiting.

use std::sync::Mutex;
use std::time::Duration;

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Records requested waits and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sleeper_keeps_order() {
        let s = RecordingSleeper::new();
        s.sleep(Duration::from_millis(500));
        s.sleep(Duration::from_secs(3));
        assert_eq!(
            s.waits(),
            vec![Duration::from_millis(500), Duration::from_secs(3)]
        );
        assert_eq!(s.total(), Duration::from_millis(3500));
    }

    #[test]
    fn thread_sleeper_skips_zero() {
        ThreadSleeper.sleep(Duration::ZERO);
    }
}
