//! Cross-process aggregation of worker snapshots.
//!
//! 1. Flatten every worker's metric list and group by metric name (first-seen order).
//! 2. Within a metric, group records by `(series name, LabelKey)`.
//! 3. Reduce each group with the metric's declared [`Aggregator`](prismetrics_core::Aggregator); `omit` keeps
//!    every worker's record, tagged with the worker label (or, when the record
//!    already carries that label, with `<worker_label>_index`).
//! 4. Register one [`AggregatedMetric`] per metric into a fresh [`Registry`].
//!
//! Workers that disagree on `type` or `aggregator` are logged and overruled by
//! the first worker's declaration; they never fail the whole aggregation.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use prismetrics_core::error::Result;
use prismetrics_core::{Aggregator, LabelKey, LabelSet, MetricSnapshot, MetricType, Observation, Registry};

use crate::aggregated::AggregatedMetric;
use crate::config::{ClusterSection, MetricsConfig};

/// Stateless merger of per-worker snapshots.
#[derive(Debug, Clone, Default)]
pub struct ClusterAggregator {
    cfg: ClusterSection,
}

impl ClusterAggregator {
    pub fn new(cfg: ClusterSection) -> Self {
        Self { cfg }
    }

    pub fn from_config(cfg: &MetricsConfig) -> Self {
        Self::new(cfg.cluster.clone())
    }

    /// Decode each worker's JSON payload, then [`aggregate`](Self::aggregate).
    ///
    /// Payloads that are not a JSON array, and individual metric entries that
    /// fail to decode, are logged and skipped. A missing `help` is empty; a
    /// missing `type` is taken from another worker's declaration of the same
    /// metric, else `untyped`.
    pub fn aggregate_json(&self, payloads: &[&str]) -> Result<Registry> {
        let decoded: Vec<Vec<WireSnapshot>> =
            payloads.iter().enumerate().map(|(worker, payload)| decode_worker(worker, payload)).collect();

        let mut declared: IndexMap<String, MetricType> = IndexMap::new();
        for metric in decoded.iter().flatten() {
            if let Some(kind) = metric.metric_type {
                declared.entry(metric.name.clone()).or_insert(kind);
            }
        }

        let workers: Vec<Vec<MetricSnapshot>> = decoded
            .into_iter()
            .map(|metrics| {
                metrics
                    .into_iter()
                    .map(|m| {
                        let metric_type = m
                            .metric_type
                            .or_else(|| declared.get(&m.name).copied())
                            .unwrap_or(MetricType::Untyped);
                        MetricSnapshot {
                            name: m.name,
                            help: m.help,
                            metric_type,
                            aggregator: m.aggregator,
                            values: m.values,
                        }
                    })
                    .collect()
            })
            .collect();
        self.aggregate(&workers)
    }

    /// Merge worker snapshots into a fresh registry.
    pub fn aggregate(&self, workers: &[Vec<MetricSnapshot>]) -> Result<Registry> {
        let mut by_name: IndexMap<&str, Vec<(usize, &MetricSnapshot)>> = IndexMap::new();
        for (worker, metrics) in workers.iter().enumerate() {
            for metric in metrics {
                by_name.entry(metric.name.as_str()).or_default().push((worker, metric));
            }
        }

        let registry = Registry::new();
        for (name, group) in by_name {
            let Some(&(_, head)) = group.first() else { continue };

            for (worker, other) in &group[1..] {
                if other.metric_type != head.metric_type || other.aggregator != head.aggregator {
                    tracing::warn!(
                        metric = %name,
                        worker = *worker,
                        kind = other.metric_type.as_str(),
                        aggregator = other.aggregator.as_str(),
                        "worker disagrees on metric declaration, using first worker's"
                    );
                }
            }

            let values = match head.aggregator.reducer() {
                Some(reduce) => self.reduce(&group, reduce),
                None => self.keep_per_worker(&group),
            };

            let merged = AggregatedMetric::new(
                head.name.clone(),
                head.help.clone(),
                head.metric_type,
                head.aggregator,
                values,
            );
            registry.register_metric(Arc::new(merged))?;
        }
        Ok(registry)
    }

    fn reduce(&self, group: &[(usize, &MetricSnapshot)], reducer: fn(&[f64]) -> f64) -> Vec<Observation> {
        let mut series: IndexMap<(Option<String>, LabelKey), (Observation, Vec<f64>)> = IndexMap::new();
        for (_, metric) in group {
            for obs in &metric.values {
                let labels = self.own_labels(&obs.labels);
                let key = (obs.metric_name.clone(), labels.key());
                series
                    .entry(key)
                    .or_insert_with(|| (Observation { value: 0.0, labels, metric_name: obs.metric_name.clone() }, Vec::new()))
                    .1
                    .push(obs.value);
            }
        }

        series
            .into_values()
            .map(|(mut obs, values)| {
                obs.value = reducer(&values);
                obs
            })
            .collect()
    }

    fn keep_per_worker(&self, group: &[(usize, &MetricSnapshot)]) -> Vec<Observation> {
        let mut out = Vec::new();
        for (worker, metric) in group {
            for obs in &metric.values {
                let mut labels = self.own_labels(&obs.labels);
                let tag = if labels.contains(&self.cfg.worker_label) {
                    format!("{}_index", self.cfg.worker_label)
                } else {
                    self.cfg.worker_label.clone()
                };
                labels.insert(tag, worker.to_string());
                out.push(Observation { value: obs.value, labels, metric_name: obs.metric_name.clone() });
            }
        }
        out
    }

    fn own_labels(&self, labels: &LabelSet) -> LabelSet {
        let mut labels = labels.clone();
        for name in &self.cfg.strip_labels {
            labels.remove(name);
        }
        labels
    }
}

/// Worker-side metric entry; `help` and `type` may be absent on the wire.
#[derive(Debug, Deserialize)]
struct WireSnapshot {
    name: String,
    #[serde(default)]
    help: String,
    #[serde(rename = "type", default)]
    metric_type: Option<MetricType>,
    #[serde(default)]
    aggregator: Aggregator,
    #[serde(default)]
    values: Vec<Observation>,
}

// A bad payload decodes to an empty list so later worker indices stay aligned.
fn decode_worker(worker: usize, payload: &str) -> Vec<WireSnapshot> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(payload) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(worker, error = %e, "skipping undecodable worker snapshot");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<WireSnapshot>(entry) {
            Ok(metric) => Some(metric),
            Err(e) => {
                tracing::warn!(worker, error = %e, "skipping undecodable metric entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prismetrics_core::Metric;

    fn gauge(aggregator: Aggregator, values: &[(f64, LabelSet)]) -> MetricSnapshot {
        MetricSnapshot {
            name: "g".into(),
            help: "help".into(),
            metric_type: MetricType::Gauge,
            aggregator,
            values: values.iter().map(|(v, l)| Observation::new(*v, l.clone())).collect(),
        }
    }

    async fn merged_values(registry: &Registry, name: &str) -> Vec<Observation> {
        let metric = registry.get_single_metric(name).unwrap();
        metric.get().await.unwrap().values
    }

    #[tokio::test]
    async fn reducers_over_three_workers() {
        let cases = [
            (Aggregator::Max, 7.0),
            (Aggregator::Average, 4.0),
            (Aggregator::Min, 2.0),
            (Aggregator::First, 3.0),
            (Aggregator::Sum, 12.0),
        ];
        for (aggregator, expected) in cases {
            let workers: Vec<Vec<MetricSnapshot>> = [3.0, 7.0, 2.0]
                .iter()
                .map(|v| vec![gauge(aggregator, &[(*v, LabelSet::new())])])
                .collect();
            let reg = ClusterAggregator::default().aggregate(&workers).unwrap();
            let values = merged_values(&reg, "g").await;
            assert_eq!(values.len(), 1, "{aggregator:?}");
            assert_eq!(values[0].value, expected, "{aggregator:?}");
        }
    }

    #[tokio::test]
    async fn strip_labels_merges_per_process_series() {
        let agg = ClusterAggregator::new(ClusterSection {
            strip_labels: vec!["pid".into()],
            ..ClusterSection::default()
        });
        let workers = vec![
            vec![gauge(Aggregator::Sum, &[(1.0, LabelSet::from([("pid", "10"), ("q", "a")]))])],
            vec![gauge(Aggregator::Sum, &[(2.0, LabelSet::from([("pid", "11"), ("q", "a")]))])],
        ];
        let values = merged_values(&agg.aggregate(&workers).unwrap(), "g").await;
        assert_eq!(values, vec![Observation::new(3.0, LabelSet::from([("q", "a")]))]);
    }

    #[tokio::test]
    async fn omit_keeps_workers_apart() {
        let workers = vec![
            vec![gauge(Aggregator::Omit, &[(5.0, LabelSet::new())])],
            vec![gauge(Aggregator::Omit, &[(9.0, LabelSet::new())])],
            vec![gauge(Aggregator::Omit, &[(1.0, LabelSet::from([("worker", "custom")]))])],
        ];
        let reg = ClusterAggregator::default().aggregate(&workers).unwrap();
        assert_eq!(
            merged_values(&reg, "g").await,
            vec![
                Observation::new(5.0, LabelSet::from([("worker", "0")])),
                Observation::new(9.0, LabelSet::from([("worker", "1")])),
                Observation::new(1.0, LabelSet::from([("worker", "custom"), ("worker_index", "2")])),
            ]
        );
    }

    #[test]
    fn decode_worker_skips_only_bad_entries() {
        let payload = r#"[{"name":"a","values":[{"value":1,"labels":{}}]},
                          {"help":"no name"},
                          {"name":"b","type":"counter"}]"#;
        let names: Vec<String> = decode_worker(0, payload).into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(decode_worker(1, r#"{"name":"a"}"#).is_empty());
    }

    #[tokio::test]
    async fn first_declaration_wins_on_mismatch() {
        let mut second = gauge(Aggregator::Max, &[(4.0, LabelSet::new())]);
        second.metric_type = MetricType::Counter;
        let workers = vec![vec![gauge(Aggregator::Sum, &[(1.0, LabelSet::new())])], vec![second]];

        let reg = ClusterAggregator::default().aggregate(&workers).unwrap();
        let metric = reg.get_single_metric("g").unwrap();
        assert_eq!(metric.metric_type(), MetricType::Gauge);
        assert_eq!(metric.aggregator(), Aggregator::Sum);
        assert_eq!(merged_values(&reg, "g").await[0].value, 5.0);
    }
}
