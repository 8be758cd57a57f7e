//! Metric shell carrying already-reduced records.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use prismetrics_core::error::Result;
use prismetrics_core::{Aggregator, Metric, MetricId, MetricSnapshot, MetricType, Observation};

/// A metric whose records were produced by cluster aggregation rather than by
/// local mutation. `reset()` drops the records.
pub struct AggregatedMetric {
    id: MetricId,
    name: String,
    help: String,
    metric_type: MetricType,
    aggregator: Aggregator,
    values: Mutex<Vec<Observation>>,
}

impl AggregatedMetric {
    pub fn new(
        name: String,
        help: String,
        metric_type: MetricType,
        aggregator: Aggregator,
        values: Vec<Observation>,
    ) -> Self {
        Self {
            id: MetricId::next(),
            name,
            help,
            metric_type,
            aggregator,
            values: Mutex::new(values),
        }
    }

    pub fn values(&self) -> Vec<Observation> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Metric for AggregatedMetric {
    fn id(&self) -> MetricId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn help(&self) -> &str {
        &self.help
    }

    fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    fn aggregator(&self) -> Aggregator {
        self.aggregator
    }

    fn reset(&self) {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    async fn get(&self) -> Result<MetricSnapshot> {
        Ok(MetricSnapshot {
            name: self.name.clone(),
            help: self.help.clone(),
            metric_type: self.metric_type,
            aggregator: self.aggregator,
            values: self.values(),
        })
    }
}
