//! prismetrics core: label-keyed metric storage, registries, and the text
//! exposition format.
//!
//! Applications build counters, gauges, histograms and summaries, mutate them
//! synchronously on the hot path, and render a [`Registry`] into the
//! Prometheus text format or into JSON snapshots for cross-process merging.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `MetricsError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod exposition;
pub mod labels;
pub mod metric;
pub mod registry;
pub mod snapshot;
pub mod validation;
pub mod value;

/// Shared result type.
pub use error::{ErrorKind, MetricsError, Result};
pub use labels::{LabelKey, LabelSet, LabelValue};
pub use metric::{
    collect_fn, Aggregator, Collect, Counter, CounterChild, Gauge, GaugeChild, Histogram,
    HistogramChild, Metric, MetricId, MetricType, Opts, Summary, SummaryChild, SummaryConfig,
};
pub use registry::{Registry, CONTENT_TYPE};
pub use snapshot::{MetricSnapshot, Observation};
