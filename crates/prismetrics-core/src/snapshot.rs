//! JSON snapshot format exchanged between a worker registry and the cluster
//! aggregator.
//!
//! ```json
//! [{ "name": "...", "help": "...", "type": "counter", "aggregator": "sum",
//!    "values": [{ "value": 1, "labels": {}, "metricName": "..." }] }]
//! ```

use serde::{Deserialize, Serialize};

use crate::labels::LabelSet;
use crate::metric::{Aggregator, MetricType};

/// One sample slot of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(with = "crate::value::sample")]
    pub value: f64,
    #[serde(default)]
    pub labels: LabelSet,
    /// Series name when it differs from the metric name (`_bucket`, `_sum`, ...).
    #[serde(rename = "metricName", default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
}

impl Observation {
    pub fn new(value: f64, labels: LabelSet) -> Self {
        Self { value, labels, metric_name: None }
    }

    pub fn with_metric_name(mut self, name: impl Into<String>) -> Self {
        self.metric_name = Some(name.into());
        self
    }
}

/// Point-in-time view of one metric, as produced by `Metric::get()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(default)]
    pub aggregator: Aggregator,
    #[serde(default)]
    pub values: Vec<Observation>,
}

/// Decode one worker's `getMetricsAsJSON` payload.
pub fn from_json(payload: &str) -> crate::Result<Vec<MetricSnapshot>> {
    Ok(serde_json::from_str(payload)?)
}

/// Encode a registry snapshot list.
pub fn to_json(snapshots: &[MetricSnapshot]) -> crate::Result<String> {
    Ok(serde_json::to_string(snapshots)?)
}
