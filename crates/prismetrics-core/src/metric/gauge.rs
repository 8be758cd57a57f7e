//! Gauge: a value that can go up and down.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MetricsError, Result};
use crate::labels::{LabelKey, LabelSet, LabelValue};
use crate::snapshot::{MetricSnapshot, Observation};

use super::{register_all, run_collect, Aggregator, Collect, LabelStore, Metric, MetricCore, MetricId, MetricType, Opts};

struct GaugeInner {
    core: MetricCore,
    store: LabelStore<f64>,
    collect: Option<Arc<dyn Collect<Gauge>>>,
}

/// Gauge handle. Clones share storage and identity.
#[derive(Clone)]
pub struct Gauge {
    inner: Arc<GaugeInner>,
}

impl Gauge {
    pub fn new(opts: Opts) -> Result<Self> {
        Self::build(opts, None)
    }

    pub fn with_collect(opts: Opts, collect: Arc<dyn Collect<Gauge>>) -> Result<Self> {
        Self::build(opts, Some(collect))
    }

    fn build(opts: Opts, collect: Option<Arc<dyn Collect<Gauge>>>) -> Result<Self> {
        let core = MetricCore::from_opts(&opts, &[])?;
        let gauge = Self {
            inner: Arc::new(GaugeInner { core, store: LabelStore::default(), collect }),
        };
        gauge.reset();
        tracing::debug!(metric = %gauge.name(), "gauge created");
        register_all(Arc::new(gauge.clone()), opts.registers.as_deref())?;
        Ok(gauge)
    }

    /// Set the label-less series. Any f64 is accepted, NaN included.
    pub fn set(&self, value: f64) {
        self.write(LabelKey::empty(), &LabelSet::new(), |v| *v = value);
    }

    pub fn set_with_labels(&self, labels: &LabelSet, value: f64) -> Result<()> {
        let key = self.inner.core.resolve(labels)?;
        self.write(key, labels, |v| *v = value);
        Ok(())
    }

    pub fn inc(&self) {
        self.write(LabelKey::empty(), &LabelSet::new(), |v| *v += 1.0);
    }

    pub fn inc_by(&self, value: f64) -> Result<()> {
        check_delta(value)?;
        self.write(LabelKey::empty(), &LabelSet::new(), |v| *v += value);
        Ok(())
    }

    pub fn inc_with_labels(&self, labels: &LabelSet, value: f64) -> Result<()> {
        check_delta(value)?;
        let key = self.inner.core.resolve(labels)?;
        self.write(key, labels, |v| *v += value);
        Ok(())
    }

    pub fn dec(&self) {
        self.write(LabelKey::empty(), &LabelSet::new(), |v| *v -= 1.0);
    }

    pub fn dec_by(&self, value: f64) -> Result<()> {
        check_delta(value)?;
        self.write(LabelKey::empty(), &LabelSet::new(), |v| *v -= value);
        Ok(())
    }

    pub fn dec_with_labels(&self, labels: &LabelSet, value: f64) -> Result<()> {
        check_delta(value)?;
        let key = self.inner.core.resolve(labels)?;
        self.write(key, labels, |v| *v -= value);
        Ok(())
    }

    pub fn labels(&self, labels: &LabelSet) -> Result<GaugeChild> {
        let key = self.inner.core.resolve(labels)?;
        Ok(GaugeChild { gauge: self.clone(), key, labels: labels.clone() })
    }

    pub fn labels_values<I, V>(&self, values: I) -> Result<GaugeChild>
    where
        I: IntoIterator<Item = V>,
        V: Into<LabelValue>,
    {
        let labels = self.inner.core.labels_from_values(values)?;
        self.labels(&labels)
    }

    pub fn remove(&self, labels: &LabelSet) -> Result<()> {
        let key = self.inner.core.resolve(labels)?;
        self.inner.store.remove(&key, self.zero_seed());
        Ok(())
    }

    pub fn remove_values<I, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<LabelValue>,
    {
        let labels = self.inner.core.labels_from_values(values)?;
        self.remove(&labels)
    }

    fn zero_seed(&self) -> Option<f64> {
        self.inner.core.label_names.is_empty().then_some(0.0)
    }

    fn write<F: FnOnce(&mut f64)>(&self, key: LabelKey, labels: &LabelSet, f: F) {
        self.inner.store.update(key, labels, || 0.0, f);
    }
}

fn check_delta(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(MetricsError::InvalidValue(value));
    }
    Ok(())
}

/// Gauge bound to one label set.
#[derive(Clone)]
pub struct GaugeChild {
    gauge: Gauge,
    key: LabelKey,
    labels: LabelSet,
}

impl GaugeChild {
    pub fn set(&self, value: f64) {
        self.gauge.write(self.key.clone(), &self.labels, |v| *v = value);
    }

    pub fn inc(&self) {
        self.gauge.write(self.key.clone(), &self.labels, |v| *v += 1.0);
    }

    pub fn inc_by(&self, value: f64) -> Result<()> {
        check_delta(value)?;
        self.gauge.write(self.key.clone(), &self.labels, |v| *v += value);
        Ok(())
    }

    pub fn dec(&self) {
        self.gauge.write(self.key.clone(), &self.labels, |v| *v -= 1.0);
    }

    pub fn dec_by(&self, value: f64) -> Result<()> {
        check_delta(value)?;
        self.gauge.write(self.key.clone(), &self.labels, |v| *v -= value);
        Ok(())
    }
}

#[async_trait]
impl Metric for Gauge {
    fn id(&self) -> MetricId {
        self.inner.core.id
    }

    fn name(&self) -> &str {
        &self.inner.core.name
    }

    fn help(&self) -> &str {
        &self.inner.core.help
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Gauge
    }

    fn aggregator(&self) -> Aggregator {
        self.inner.core.aggregator
    }

    fn reset(&self) {
        self.inner.store.reset(self.zero_seed());
    }

    async fn get(&self) -> Result<MetricSnapshot> {
        run_collect(self.inner.collect.as_ref(), self, self.name()).await?;
        Ok(MetricSnapshot {
            name: self.name().to_string(),
            help: self.help().to_string(),
            metric_type: MetricType::Gauge,
            aggregator: self.aggregator(),
            values: self
                .inner
                .store
                .collect_sorted(|labels, v| vec![Observation::new(*v, labels.clone())]),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_inc_dec() {
        let g = Gauge::new(Opts::new("queue_depth", "Depth").registers([])).unwrap();
        g.set(10.0);
        g.inc();
        g.dec_by(4.0).unwrap();
        assert_eq!(g.get().await.unwrap().values[0].value, 7.0);

        assert!(g.inc_by(f64::NAN).is_err());
        g.set(f64::NAN);
        assert!(g.get().await.unwrap().values[0].value.is_nan());
    }

    #[tokio::test]
    async fn children_track_their_own_series() {
        let g = Gauge::new(Opts::new("pool_size", "Size").label_names(["pool"]).registers([])).unwrap();
        let a = g.labels_values(["a"]).unwrap();
        let b = g.labels(&LabelSet::from([("pool", "b")])).unwrap();
        a.set(3.0);
        b.inc();
        b.dec_by(2.0).unwrap();

        let values = g.get().await.unwrap().values;
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].value, 3.0);
        assert_eq!(values[1].value, -1.0);
    }

    #[tokio::test]
    async fn collector_can_set_value() {
        let g = Gauge::with_collect(
            Opts::new("uptime_seconds", "Uptime").registers([]).aggregator(Aggregator::Omit),
            crate::metric::collect_fn(|g: &Gauge| {
                g.set(42.0);
                Ok(())
            }),
        )
        .unwrap();
        let snap = g.get().await.unwrap();
        assert_eq!(snap.aggregator, Aggregator::Omit);
        assert_eq!(snap.values[0].value, 42.0);
    }
}
