//! Metric registry.
//!
//! A `Registry` is a cheap-to-clone handle onto a shared, insertion-ordered
//! `name -> metric` map plus the default labels injected at render time.
//! Locks are never held across an `.await`: render paths copy the metric
//! handles out first, then await every `get()` concurrently.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::try_join_all;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::{MetricsError, Result};
use crate::exposition::render_metric;
use crate::labels::LabelSet;
use crate::metric::Metric;
use crate::snapshot::MetricSnapshot;

/// Content-Type of the rendered text format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

#[derive(Default)]
struct RegistryInner {
    metrics: IndexMap<String, Arc<dyn Metric>>,
    default_labels: LabelSet,
}

/// Container for registered metrics.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used when a metric names no target registries.
    ///
    /// Created once on first use and never recreated; empty it with [`Registry::clear`].
    pub fn global() -> Registry {
        GLOBAL.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a metric. Re-registering the same metric object is a no-op;
    /// a different object under a taken name is rejected.
    pub fn register_metric(&self, metric: Arc<dyn Metric>) -> Result<()> {
        let mut inner = self.write();
        if let Some(existing) = inner.metrics.get(metric.name()) {
            if existing.id() != metric.id() {
                tracing::warn!(metric = %metric.name(), "duplicate metric name rejected");
                return Err(MetricsError::DuplicateMetric(metric.name().to_string()));
            }
            return Ok(());
        }
        tracing::debug!(metric = %metric.name(), "metric registered");
        inner.metrics.insert(metric.name().to_string(), metric);
        Ok(())
    }

    pub fn remove_single_metric(&self, name: &str) {
        if self.write().metrics.shift_remove(name).is_some() {
            tracing::debug!(metric = %name, "metric removed");
        }
    }

    /// Remove every metric and the default labels.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.metrics.clear();
        inner.default_labels = LabelSet::new();
        tracing::debug!("registry cleared");
    }

    /// Replace the default labels wholesale.
    pub fn set_default_labels(&self, labels: LabelSet) {
        self.write().default_labels = labels;
    }

    pub fn default_labels(&self) -> LabelSet {
        self.read().default_labels.clone()
    }

    /// Call `reset()` on every registered metric.
    pub fn reset_metrics(&self) {
        for metric in self.get_metrics_as_array() {
            metric.reset();
        }
        tracing::debug!("registry metrics reset");
    }

    /// Registered metrics in registration order.
    pub fn get_metrics_as_array(&self) -> Vec<Arc<dyn Metric>> {
        self.read().metrics.values().cloned().collect()
    }

    pub fn get_single_metric(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.read().metrics.get(name).cloned()
    }

    /// Snapshot every metric, with default labels applied to copies of the
    /// records. Fails if any collector fails.
    pub async fn get_metrics_as_json(&self) -> Result<Vec<MetricSnapshot>> {
        let metrics = self.get_metrics_as_array();
        let defaults = self.default_labels();

        let mut snapshots = try_join_all(metrics.iter().map(|m| m.get())).await?;
        if !defaults.is_empty() {
            for snap in &mut snapshots {
                for obs in &mut snap.values {
                    obs.labels = obs.labels.with_defaults(&defaults);
                }
            }
        }
        Ok(snapshots)
    }

    /// Render one metric in the text format.
    pub async fn get_metric_as_prometheus_string(&self, metric: &dyn Metric) -> Result<String> {
        let snapshot = metric.get().await?;
        Ok(render_metric(&snapshot, &self.default_labels()))
    }

    pub async fn get_single_metric_as_string(&self, name: &str) -> Result<String> {
        let metric = self
            .get_single_metric(name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))?;
        self.get_metric_as_prometheus_string(metric.as_ref()).await
    }

    /// Render every metric: blocks joined by a blank line, one trailing newline.
    pub async fn metrics(&self) -> Result<String> {
        let metrics = self.get_metrics_as_array();
        let blocks = try_join_all(metrics.iter().map(|m| self.get_metric_as_prometheus_string(m.as_ref()))).await?;
        Ok(format!("{}\n", blocks.join("\n\n")))
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// Structural merge: a new registry holding every metric object of
    /// `registries`, in iteration order. Fails on a name bound to two
    /// different objects.
    pub fn merge(registries: &[Registry]) -> Result<Registry> {
        let merged = Registry::new();
        for registry in registries {
            for metric in registry.get_metrics_as_array() {
                merged.register_metric(metric)?;
            }
        }
        Ok(merged)
    }
}
