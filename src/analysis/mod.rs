//! Analysis modules.
//!
//! The aggregator holds the core counting and bucketing logic; the other
//! modules add diversity, discovery and audio-feature views on the same
//! snapshot.

pub mod aggregator;
pub mod diversity;
pub mod evolution;
pub mod features;

pub use aggregator::*;
