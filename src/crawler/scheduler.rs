//! Pacing schedule for the crawl loop
//!
//! This module handles:
//! - Randomized politeness delays between items
//! - Longer randomized delays after a failed item
//! - Checkpoint and periodic-break cadence
//! - Sleeps that wake early when the run is interrupted

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Decides how long to wait and when to checkpoint or break
#[derive(Debug, Clone)]
pub struct Scheduler {
    delay: (Duration, Duration),
    error_delay: (Duration, Duration),
    break_length: (Duration, Duration),
    checkpoint_interval: usize,
    break_interval: usize,
}

impl Scheduler {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            delay: config.delay_range(),
            error_delay: config.error_delay_range(),
            break_length: config.break_range(),
            checkpoint_interval: config.checkpoint_interval.max(1),
            break_interval: config.break_interval.max(1),
        }
    }

    /// Delay after a successfully processed item
    pub fn steady_delay(&self) -> Duration {
        random_between(self.delay.0, self.delay.1)
    }

    /// Delay after a failed item
    pub fn error_delay(&self) -> Duration {
        random_between(self.error_delay.0, self.error_delay.1)
    }

    /// Length of a periodic break
    pub fn break_duration(&self) -> Duration {
        random_between(self.break_length.0, self.break_length.1)
    }

    /// Returns true when `completed` items warrant a checkpoint
    pub fn checkpoint_due(&self, completed: usize) -> bool {
        completed > 0 && completed % self.checkpoint_interval == 0
    }

    /// Returns true when `completed` items warrant a periodic break
    ///
    /// No break is taken once every known item is done.
    pub fn break_due(&self, completed: usize, total: Option<usize>) -> bool {
        completed > 0
            && completed % self.break_interval == 0
            && total.map_or(true, |total| completed < total)
    }
}

/// Draws a duration uniformly from `[min, max]` at millisecond resolution
pub fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let low = min.as_millis() as u64;
    let high = max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

/// Sleeps for `duration` unless `cancel` fires first
///
/// Returns `true` if the full duration elapsed.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => {
            tracing::debug!("Pause cut short by interrupt");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CrawlerConfig {
        CrawlerConfig {
            delay_min_ms: 100,
            delay_max_ms: 200,
            error_delay_min_ms: 300,
            error_delay_max_ms: 300,
            checkpoint_interval: 25,
            break_interval: 100,
            ..CrawlerConfig::default()
        }
    }

    #[test]
    fn test_delays_stay_in_range() {
        let scheduler = Scheduler::new(&config());
        for _ in 0..50 {
            let delay = scheduler.steady_delay();
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(200));
        }
        assert_eq!(scheduler.error_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_default_break_length() {
        let scheduler = Scheduler::new(&CrawlerConfig::default());
        let length = scheduler.break_duration();
        assert!(length >= Duration::from_secs(30) && length <= Duration::from_secs(60));
    }

    #[test]
    fn test_checkpoint_cadence() {
        let scheduler = Scheduler::new(&config());
        assert!(!scheduler.checkpoint_due(0));
        assert!(!scheduler.checkpoint_due(24));
        assert!(scheduler.checkpoint_due(25));
        assert!(scheduler.checkpoint_due(50));
        assert!(!scheduler.checkpoint_due(51));
    }

    #[test]
    fn test_break_cadence() {
        let scheduler = Scheduler::new(&config());
        assert!(!scheduler.break_due(99, Some(500)));
        assert!(scheduler.break_due(100, Some(500)));
        assert!(scheduler.break_due(200, None));
        // Nothing left to pace
        assert!(!scheduler.break_due(100, Some(100)));
    }

    #[test]
    fn test_random_between_degenerate_range() {
        let d = Duration::from_millis(42);
        assert_eq!(random_between(d, d), d);
        assert_eq!(random_between(d, Duration::from_millis(1)), d);
    }

    #[tokio::test]
    async fn test_pause_completes() {
        let token = CancellationToken::new();
        assert!(pause(Duration::from_millis(5), &token).await);
    }

    #[tokio::test]
    async fn test_pause_wakes_on_cancel() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        assert!(!pause(Duration::from_secs(30), &token).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
