//! Aggregation pipeline: concurrent fetch, merge, and scoring.
//!
//! [`fetch`] fans one researcher out to every configured source, [`dedup`]
//! merges overlapping publications and groups dataset fragments, and
//! [`scoring`] turns the merged artifacts into QIC scores and the S-Index.

pub mod dedup;
pub mod fetch;
pub mod scoring;
pub mod title;

pub use fetch::{Orchestrator, ResearcherRawData};
