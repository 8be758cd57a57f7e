//! prismetrics cluster: merges JSON snapshots from several worker registries
//! into one registry, plus the YAML configuration that drives it.
//!
//! Aggregation is a pure, synchronous reduction over snapshots the caller has
//! already gathered; it performs no I/O.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod aggregated;
pub mod aggregator;
pub mod config;

pub use aggregated::AggregatedMetric;
pub use aggregator::ClusterAggregator;
pub use config::{ClusterSection, MetricsConfig, RegistrySection};
