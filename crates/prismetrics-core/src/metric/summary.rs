//! Summary: quantiles over a sliding window of recent observations.
//!
//! Quantiles use the nearest-rank method over at most `max_samples` retained
//! values; `_sum` and `_count` cover every observation since the last reset.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MetricsError, Result};
use crate::labels::{LabelKey, LabelSet, LabelValue};
use crate::snapshot::{MetricSnapshot, Observation};

use super::{register_all, run_collect, Aggregator, Collect, LabelStore, Metric, MetricCore, MetricId, MetricType, Opts};

pub const DEFAULT_PERCENTILES: [f64; 7] = [0.01, 0.05, 0.5, 0.9, 0.95, 0.99, 0.999];
pub const DEFAULT_MAX_SAMPLES: usize = 1024;

const QUANTILE_LABEL: &str = "quantile";

/// Summary-specific options.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Each in `(0, 1]`.
    pub percentiles: Vec<f64>,
    pub max_samples: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

struct SummaryData {
    window: VecDeque<f64>,
    sum: f64,
    count: u64,
}

impl SummaryData {
    fn zero() -> Self {
        Self { window: VecDeque::new(), sum: 0.0, count: 0 }
    }

    fn quantiles(&self, percentiles: &[f64]) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        percentiles.iter().map(|q| nearest_rank(&sorted, *q)).collect()
    }
}

fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

struct SummaryInner {
    core: MetricCore,
    config: SummaryConfig,
    store: LabelStore<SummaryData>,
    collect: Option<Arc<dyn Collect<Summary>>>,
}

/// Summary handle. Clones share storage and identity.
#[derive(Clone)]
pub struct Summary {
    inner: Arc<SummaryInner>,
}

impl Summary {
    pub fn new(opts: Opts) -> Result<Self> {
        Self::build(opts, SummaryConfig::default(), None)
    }

    pub fn with_config(opts: Opts, config: SummaryConfig) -> Result<Self> {
        Self::build(opts, config, None)
    }

    pub fn with_collect(opts: Opts, config: SummaryConfig, collect: Arc<dyn Collect<Summary>>) -> Result<Self> {
        Self::build(opts, config, Some(collect))
    }

    fn build(opts: Opts, config: SummaryConfig, collect: Option<Arc<dyn Collect<Summary>>>) -> Result<Self> {
        let core = MetricCore::from_opts(&opts, &[QUANTILE_LABEL])?;
        if config.percentiles.iter().any(|q| !(*q > 0.0 && *q <= 1.0)) {
            return Err(MetricsError::InvalidOptions(format!(
                "{}: percentiles must be in (0, 1]",
                core.name
            )));
        }
        if config.max_samples == 0 {
            return Err(MetricsError::InvalidOptions(format!(
                "{}: max_samples must be greater than 0",
                core.name
            )));
        }

        let summary = Self {
            inner: Arc::new(SummaryInner { core, config, store: LabelStore::default(), collect }),
        };
        summary.reset();
        tracing::debug!(metric = %summary.name(), "summary created");
        register_all(Arc::new(summary.clone()), opts.registers.as_deref())?;
        Ok(summary)
    }

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

    pub fn labels(&self, labels: &LabelSet) -> Result<SummaryChild> {
        let key = self.inner.core.resolve(labels)?;
        Ok(SummaryChild { summary: self.clone(), key, labels: labels.clone() })
    }

    pub fn labels_values<I, V>(&self, values: I) -> Result<SummaryChild>
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

    fn zero_seed(&self) -> Option<SummaryData> {
        self.inner.core.label_names.is_empty().then(SummaryData::zero)
    }

    fn record(&self, key: LabelKey, labels: &LabelSet, value: f64) {
        let cap = self.inner.config.max_samples;
        self.inner.store.update(key, labels, SummaryData::zero, |s| {
            if s.window.len() == cap {
                s.window.pop_front();
            }
            s.window.push_back(value);
            s.sum += value;
            s.count += 1;
        });
    }

    fn series(&self, labels: &LabelSet, s: &SummaryData) -> Vec<Observation> {
        let name = &self.inner.core.name;
        let percentiles = &self.inner.config.percentiles;
        let mut out = Vec::with_capacity(percentiles.len() + 2);

        for (q, v) in percentiles.iter().zip(s.quantiles(percentiles)) {
            out.push(Observation::new(v, labels.clone().with(QUANTILE_LABEL, *q)));
        }
        out.push(Observation::new(s.sum, labels.clone()).with_metric_name(format!("{name}_sum")));
        out.push(Observation::new(s.count as f64, labels.clone()).with_metric_name(format!("{name}_count")));
        out
    }
}

fn check_observation(value: f64) -> Result<()> {
    if value.is_nan() {
        return Err(MetricsError::InvalidValue(value));
    }
    Ok(())
}

/// Summary bound to one label set.
#[derive(Clone)]
pub struct SummaryChild {
    summary: Summary,
    key: LabelKey,
    labels: LabelSet,
}

impl SummaryChild {
    pub fn observe(&self, value: f64) -> Result<()> {
        check_observation(value)?;
        self.summary.record(self.key.clone(), &self.labels, value);
        Ok(())
    }
}

#[async_trait]
impl Metric for Summary {
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
        MetricType::Summary
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
            metric_type: MetricType::Summary,
            aggregator: self.aggregator(),
            values: self.inner.store.collect_sorted(|labels, s| self.series(labels, s)),
        })
    }
}
