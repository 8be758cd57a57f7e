//! Top-level facade crate for prismetrics.
//!
//! Re-exports the metric/registry core and the cluster aggregator so users can depend on a single crate.

pub mod core {
    pub use prismetrics_core::*;
}

pub mod cluster {
    pub use prismetrics_cluster::*;
}
