//! State module for tracking crawl progress
//!
//! `CrawlPhase` is the scheduler's state machine; durable progress lives in
//! [`crate::checkpoint`].

mod crawl_phase;

pub use crawl_phase::CrawlPhase;
