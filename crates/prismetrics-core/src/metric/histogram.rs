//! Histogram: counts observations into cumulative buckets.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MetricsError, Result};
use crate::labels::{LabelKey, LabelSet, LabelValue};
use crate::snapshot::{MetricSnapshot, Observation};

use super::{register_all, run_collect, Aggregator, Collect, LabelStore, Metric, MetricCore, MetricId, MetricType, Opts};

pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

const BUCKET_LABEL: &str = "le";

/// Per-series state. `counts[i]` holds observations in `(bounds[i-1], bounds[i]]`.
#[derive(Clone)]
struct HistogramData {
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramData {
    fn zero(buckets: usize) -> Self {
        Self { counts: vec![0; buckets], sum: 0.0, count: 0 }
    }
}

struct HistogramInner {
    core: MetricCore,
    bounds: Vec<f64>,
    store: LabelStore<HistogramData>,
    collect: Option<Arc<dyn Collect<Histogram>>>,
}

/// Histogram handle. Clones share storage and identity.
#[derive(Clone)]
pub struct Histogram {
    inner: Arc<HistogramInner>,
}

impl Histogram {
    /// Histogram with [`DEFAULT_BUCKETS`].
    pub fn new(opts: Opts) -> Result<Self> {
        Self::build(opts, DEFAULT_BUCKETS.to_vec(), None)
    }

    /// Histogram with explicit upper bounds (finite, strictly increasing).
    pub fn with_buckets(opts: Opts, buckets: Vec<f64>) -> Result<Self> {
        Self::build(opts, buckets, None)
    }

    pub fn with_collect(opts: Opts, buckets: Vec<f64>, collect: Arc<dyn Collect<Histogram>>) -> Result<Self> {
        Self::build(opts, buckets, Some(collect))
    }

    fn build(opts: Opts, bounds: Vec<f64>, collect: Option<Arc<dyn Collect<Histogram>>>) -> Result<Self> {
        let core = MetricCore::from_opts(&opts, &[BUCKET_LABEL])?;
        validate_bounds(&core.name, &bounds)?;

        let histogram = Self {
            inner: Arc::new(HistogramInner { core, bounds, store: LabelStore::default(), collect }),
        };
        histogram.reset();
        tracing::debug!(metric = %histogram.name(), buckets = histogram.inner.bounds.len(), "histogram created");
        register_all(Arc::new(histogram.clone()), opts.registers.as_deref())?;
        Ok(histogram)
    }

    pub fn buckets(&self) -> &[f64] {
        &self.inner.bounds
    }

    /// Observe into the label-less series.
    pub fn observe(&self, value: f64) -> Result<()> {
        check_observation(value)?;
        self.record(LabelKey::empty(), &LabelSet::new(), value);
        Ok(())
    }

    pub fn observe_with_labels(&self, labels: &LabelSet, value: f64) -> Result<()> {
        check_observation(value)?;
        let key = self.inner.core.resolve(labels)?;
        self.record(key, labels, value);
        Ok(())
    }

    pub fn labels(&self, labels: &LabelSet) -> Result<HistogramChild> {
        let key = self.inner.core.resolve(labels)?;
        Ok(HistogramChild { histogram: self.clone(), key, labels: labels.clone() })
    }

    pub fn labels_values<I, V>(&self, values: I) -> Result<HistogramChild>
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

    fn zero_seed(&self) -> Option<HistogramData> {
        self.inner
            .core
            .label_names
            .is_empty()
            .then(|| HistogramData::zero(self.inner.bounds.len()))
    }

    fn record(&self, key: LabelKey, labels: &LabelSet, value: f64) {
        let bounds = &self.inner.bounds;
        let idx = bounds.iter().position(|b| value <= *b);
        self.inner.store.update(
            key,
            labels,
            || HistogramData::zero(bounds.len()),
            |h| {
                if let Some(i) = idx {
                    h.counts[i] += 1;
                }
                h.sum += value;
                h.count += 1;
            },
        );
    }

    /// Expand one series into `_bucket`/`_sum`/`_count` records.
    fn series(&self, labels: &LabelSet, h: &HistogramData) -> Vec<Observation> {
        let name = &self.inner.core.name;
        let bucket_name = format!("{name}_bucket");
        let mut out = Vec::with_capacity(h.counts.len() + 3);

        let mut acc = 0u64;
        for (bound, count) in self.inner.bounds.iter().zip(&h.counts) {
            acc += count;
            let le = labels.clone().with(BUCKET_LABEL, *bound);
            out.push(Observation::new(acc as f64, le).with_metric_name(&bucket_name));
        }
        let le = labels.clone().with(BUCKET_LABEL, "+Inf");
        out.push(Observation::new(h.count as f64, le).with_metric_name(&bucket_name));
        out.push(Observation::new(h.sum, labels.clone()).with_metric_name(format!("{name}_sum")));
        out.push(Observation::new(h.count as f64, labels.clone()).with_metric_name(format!("{name}_count")));
        out
    }
}

fn validate_bounds(name: &str, bounds: &[f64]) -> Result<()> {
    if bounds.is_empty() {
        return Err(MetricsError::InvalidOptions(format!("{name}: buckets must not be empty")));
    }
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(MetricsError::InvalidOptions(format!("{name}: bucket bounds must be finite")));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(MetricsError::InvalidOptions(format!(
            "{name}: bucket bounds must be strictly increasing"
        )));
    }
    Ok(())
}

fn check_observation(value: f64) -> Result<()> {
    if value.is_nan() {
        return Err(MetricsError::InvalidValue(value));
    }
    Ok(())
}

/// Histogram bound to one label set.
#[derive(Clone)]
pub struct HistogramChild {
    histogram: Histogram,
    key: LabelKey,
    labels: LabelSet,
}

impl HistogramChild {
    pub fn observe(&self, value: f64) -> Result<()> {
        check_observation(value)?;
        self.histogram.record(self.key.clone(), &self.labels, value);
        Ok(())
    }
}

#[async_trait]
impl Metric for Histogram {
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
        MetricType::Histogram
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
            metric_type: MetricType::Histogram,
            aggregator: self.aggregator(),
            values: self.inner.store.collect_sorted(|labels, h| self.series(labels, h)),
        })
    }
}
