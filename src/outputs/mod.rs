//! Everything the pipeline writes to disk.
//!
//! # Submodules
//!
//! - [`json`]: pre- and post-rewrite snapshots of the article set
//! - [`artifacts`]: per-run screenshots and raw HTML of rendered articles

pub mod artifacts;
pub mod json;
