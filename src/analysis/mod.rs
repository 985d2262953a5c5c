//! Review aggregation.
//!
//! Turns the batch records of a reporting window into a deduplicated,
//! validated rating tally.

pub mod aggregator;

pub use aggregator::*;
