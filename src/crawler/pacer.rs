//! Minimum delay between consecutive network fetches

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Keeps a fixed minimum idle gap between network fetches
///
/// Call [`Pacer::wait`] immediately before every network attempt and
/// [`Pacer::finish`] once it completes, whatever its outcome. The gap is
/// measured from the end of the previous attempt, so a slow response does not
/// shorten it. The first attempt never waits; cache hits call neither.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_finished: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_finished: None,
        }
    }

    /// Sleeps until the interval since the previous attempt finished has
    /// elapsed
    pub async fn wait(&self) {
        if let Some(last) = self.last_finished {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let remaining = self.interval - elapsed;
                debug!(delay_ms = remaining.as_millis() as u64, "Pacing next fetch");
                sleep(remaining).await;
            }
        }
    }

    /// Records the end of a network attempt
    pub fn finish(&mut self) {
        self.last_finished = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_wait_is_immediate() {
        let pacer = Pacer::new(Duration::from_secs(60));
        let started = Instant::now();

        pacer.wait().await;

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_gap_is_measured_from_finish() {
        let mut pacer = Pacer::new(Duration::from_millis(100));

        pacer.wait().await;
        // A slow attempt
        sleep(Duration::from_millis(80)).await;
        pacer.finish();

        let finished = Instant::now();
        pacer.wait().await;
        assert!(finished.elapsed() >= Duration::from_millis(95));
    }

    #[tokio::test]
    async fn test_gap_already_elapsed_does_not_sleep() {
        let mut pacer = Pacer::new(Duration::from_millis(20));
        pacer.finish();
        sleep(Duration::from_millis(40)).await;

        let started = Instant::now();
        pacer.wait().await;
        assert!(started.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_zero_interval_never_sleeps() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let started = Instant::now();

        for _ in 0..10 {
            pacer.wait().await;
            pacer.finish();
        }

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
