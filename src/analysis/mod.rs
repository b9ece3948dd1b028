//! Analysis of collected source results.
//!
//! Digest building and status grouping live in [`aggregator`]; parsing of
//! the model's summary reply lives in [`summary`].

pub mod aggregator;
pub mod summary;

pub use aggregator::*;
