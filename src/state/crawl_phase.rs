/// Crawl phase definitions for the scheduler state machine
///
/// The scheduler moves through these phases for every work item; transitions
/// outside the table below are rejected as internal errors.
use std::fmt;

/// The phase the crawl loop is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Setup =====
    /// Loading state and resolving the work queue
    Init,

    // ===== Per-item phases =====
    /// Fetching a listing page (pagination mode)
    Listing,

    /// Fetching a product detail page
    Fetch,

    /// Running the field rules over a fetched page
    Extract,

    /// Adding the finished record to the product set
    Record,

    /// Persisting the checkpoint and interim exports
    Checkpoint,

    /// Long periodic break with identity rotation
    Break,

    /// Politeness delay before the next item
    Delay,

    // ===== Teardown =====
    /// Writing exports and, on a clean run, downloading images
    Finalizing,

    /// Run finished
    Done,
}

impl CrawlPhase {
    /// Returns true if the scheduler may move from `self` to `next`
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        matches!(
            (self, next),
            (Init, Listing | Fetch | Finalizing)
                | (Listing, Fetch | Delay)
                | (Fetch, Extract | Delay)
                | (Extract, Record)
                | (Record, Checkpoint | Break | Delay)
                | (Checkpoint, Break | Delay)
                | (Break, Delay)
                | (Delay, Listing | Fetch | Finalizing)
                | (Finalizing, Done)
        )
    }

    /// Returns true for the final phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true for phases that belong to a single work item
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::Listing
                | Self::Fetch
                | Self::Extract
                | Self::Record
                | Self::Checkpoint
                | Self::Break
                | Self::Delay
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Listing => "listing",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Record => "record",
            Self::Checkpoint => "checkpoint",
            Self::Break => "break",
            Self::Delay => "delay",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
