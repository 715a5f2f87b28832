//! Progress estimation.
//!
//! This module smooths per-settle byte samples into a stable throughput
//! figure and derives the ETA from remaining bytes.

mod rate;

pub use rate::RateEstimator;
