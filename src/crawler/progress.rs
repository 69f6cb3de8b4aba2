//! Progress counters and ETA reporting for the crawl loop

use std::time::{Duration, Instant};

/// Running counters for one crawl
#[derive(Debug, Clone)]
pub struct Progress {
    started: Instant,
    total: usize,
    completed: usize,
    errors: usize,
    report_every: usize,
}

impl Progress {
    pub fn new(total: usize, report_every: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            completed: 0,
            errors: 0,
            report_every: report_every.max(1),
        }
    }

    /// Updates the expected item count (listing mode learns it page by page)
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    /// Counts a processed item and returns the new completed count
    pub fn record_success(&mut self) -> usize {
        self.completed += 1;
        self.completed
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    /// Report early (1st and 5th item) and then every `report_every` items
    pub fn should_report(&self) -> bool {
        matches!(self.completed, 1 | 5) || self.completed % self.report_every == 0
    }

    pub fn eta(&self) -> Option<Duration> {
        estimate_eta(self.completed, self.total, self.elapsed())
    }

    /// Logs a one-line progress report
    pub fn log(&self) {
        tracing::info!(
            "Progress: {}/{} ({:.1}%) | Errors: {} | ETA: {}",
            self.completed,
            self.total,
            self.percent(),
            self.errors,
            format_eta(self.eta())
        );
    }
}

/// Estimates the remaining time from the average rate so far
///
/// Returns `None` until at least one item has completed.
pub fn estimate_eta(completed: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    if completed == 0 || elapsed.is_zero() {
        return None;
    }
    let per_item = elapsed.as_secs_f64() / completed as f64;
    let remaining = total.saturating_sub(completed) as f64;
    Some(Duration::from_secs_f64(per_item * remaining))
}

/// Formats an ETA as `H:MM:SS`
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => format_duration(eta),
        None => "calculating...".to_string(),
    }
}

/// Formats a duration as `H:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
