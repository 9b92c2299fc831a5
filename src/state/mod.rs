//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SkipReason` / `SkipKind`: why a candidate was not accepted
//! - `StopReason` / `DiscoveryEnd`: why a run or its discovery ended
//! - `CrawlCursor`: counters and flags mutated by the crawl loop
//! - `RunStatus`: lifecycle of a run row in the ledger database

mod cursor;
mod skip;

pub use cursor::{CrawlCursor, DiscoveryEnd, RunStatus, StopReason};
pub use skip::{SkipKind, SkipReason, SkippedCandidate};
