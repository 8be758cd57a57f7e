//! Metric Base Contract shared by every metric kind.
//!
//! - `Opts` carries name/help/label names/target registries/aggregator.
//! - `MetricCore` validates them once and resolves caller label sets to
//!   [`LabelKey`]s.
//! - `LabelStore` is the per-metric `LabelKey -> record` map, backed by `DashMap`
//!   so hot-path mutation never suspends.
//! - [`Metric`] is the object-safe view a [`Registry`] holds.

pub mod counter;
pub mod gauge;
pub mod histogram;
pub mod summary;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::labels::{LabelKey, LabelSet, LabelValue};
use crate::registry::Registry;
use crate::snapshot::MetricSnapshot;
use crate::validation::{validate_label_name, validate_labels, validate_metric_name};

pub use counter::{Counter, CounterChild};
pub use gauge::{Gauge, GaugeChild};
pub use histogram::{Histogram, HistogramChild, DEFAULT_BUCKETS};
pub use summary::{Summary, SummaryChild, SummaryConfig, DEFAULT_MAX_SAMPLES, DEFAULT_PERCENTILES};

/// Metric kind, as written in `# TYPE` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    /// Only produced when merging snapshots that never declared a type.
    Untyped,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
            MetricType::Untyped => "untyped",
        }
    }
}

/// Reduction rule used when merging the same series across worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    /// Keep every worker's sample distinct.
    Omit,
    #[default]
    Sum,
    First,
    Min,
    Max,
    Average,
}

impl Aggregator {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregator::Omit => "omit",
            Aggregator::Sum => "sum",
            Aggregator::First => "first",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
            Aggregator::Average => "average",
        }
    }

    /// Reducer over one series' per-worker values. `Omit` has none.
    ///
    /// Callers pass a non-empty slice in worker order. A NaN input makes every
    /// reducer except `first` return NaN; `first` returns the first value as-is.
    pub fn reducer(self) -> Option<fn(&[f64]) -> f64> {
        match self {
            Aggregator::Omit => None,
            Aggregator::Sum => Some(reduce_sum),
            Aggregator::First => Some(reduce_first),
            Aggregator::Min => Some(reduce_min),
            Aggregator::Max => Some(reduce_max),
            Aggregator::Average => Some(reduce_average),
        }
    }
}

fn reduce_sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn reduce_first(values: &[f64]) -> f64 {
    values.first().copied().unwrap_or(f64::NAN)
}

fn reduce_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, |acc, v| nan_aware(acc, v, f64::min))
}

fn reduce_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, |acc, v| nan_aware(acc, v, f64::max))
}

// f64::min/max skip NaN; keep it sticky like sum/average do.
fn nan_aware(acc: f64, v: f64, pick: fn(f64, f64) -> f64) -> f64 {
    if acc.is_nan() || v.is_nan() {
        f64::NAN
    } else {
        pick(acc, v)
    }
}

fn reduce_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    reduce_sum(values) / values.len() as f64
}

/// Process-unique identity of a metric object. Clones of a handle share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricId(u64);

static NEXT_METRIC_ID: AtomicU64 = AtomicU64::new(1);

impl MetricId {
    pub fn next() -> Self {
        Self(NEXT_METRIC_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Object-safe view of a metric, as held by a [`Registry`].
#[async_trait]
pub trait Metric: Send + Sync {
    fn id(&self) -> MetricId;
    fn name(&self) -> &str;
    fn help(&self) -> &str;
    fn metric_type(&self) -> MetricType;
    fn aggregator(&self) -> Aggregator;

    /// Drop all recorded values; label-less metrics get their zero record back.
    fn reset(&self);

    /// Run the collector (if any), then snapshot every record.
    async fn get(&self) -> Result<MetricSnapshot>;
}

/// User hook run by `get()` before the snapshot is taken.
#[async_trait]
pub trait Collect<M>: Send + Sync {
    async fn collect(&self, metric: &M) -> Result<()>;
}

/// Adapter for synchronous collector closures.
pub struct CollectFn<F>(F);

#[async_trait]
impl<M, F> Collect<M> for CollectFn<F>
where
    M: Sync,
    F: Fn(&M) -> Result<()> + Send + Sync,
{
    async fn collect(&self, metric: &M) -> Result<()> {
        (self.0)(metric)
    }
}

/// Wrap a synchronous closure as a collector.
pub fn collect_fn<M, F>(f: F) -> Arc<dyn Collect<M>>
where
    M: Sync + 'static,
    F: Fn(&M) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(CollectFn(f))
}

/// Construction options shared by all metric kinds.
#[derive(Clone, Default)]
pub struct Opts {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
    /// `None` registers into [`Registry::global`]; `Some(vec![])` registers nowhere.
    pub registers: Option<Vec<Registry>>,
    pub aggregator: Aggregator,
}

impl Opts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            ..Self::default()
        }
    }

    pub fn label_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn registers<I>(mut self, registries: I) -> Self
    where
        I: IntoIterator<Item = Registry>,
    {
        self.registers = Some(registries.into_iter().collect());
        self
    }

    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }
}

/// Validated name/help/labels shared by every kind.
pub(crate) struct MetricCore {
    pub(crate) id: MetricId,
    pub(crate) name: String,
    pub(crate) help: String,
    pub(crate) label_names: Vec<String>,
    pub(crate) aggregator: Aggregator,
}

impl MetricCore {
    pub(crate) fn from_opts(opts: &Opts, reserved: &[&str]) -> Result<Self> {
        if opts.help.is_empty() {
            return Err(MetricsError::MissingHelp);
        }
        if opts.name.is_empty() {
            return Err(MetricsError::MissingName);
        }
        if !validate_metric_name(&opts.name) {
            return Err(MetricsError::InvalidMetricName(opts.name.clone()));
        }
        for label in &opts.label_names {
            if !validate_label_name(label) {
                return Err(MetricsError::InvalidLabelName(label.clone()));
            }
            if reserved.contains(&label.as_str()) {
                return Err(MetricsError::InvalidOptions(format!(
                    "{label} is a reserved label name for {}",
                    opts.name
                )));
            }
        }

        Ok(Self {
            id: MetricId::next(),
            name: opts.name.clone(),
            help: opts.help.clone(),
            label_names: opts.label_names.clone(),
            aggregator: opts.aggregator,
        })
    }

    /// Validate a caller label set and return its storage key.
    pub(crate) fn resolve(&self, labels: &LabelSet) -> Result<LabelKey> {
        validate_labels(&self.label_names, labels)?;
        Ok(labels.key())
    }

    /// Pair positional values with the declared label names.
    pub(crate) fn labels_from_values<I, V>(&self, values: I) -> Result<LabelSet>
    where
        I: IntoIterator<Item = V>,
        V: Into<LabelValue>,
    {
        let values: Vec<LabelValue> = values.into_iter().map(Into::into).collect();
        if values.len() != self.label_names.len() {
            return Err(MetricsError::ArgumentCount {
                expected: self.label_names.len(),
                got: values.len(),
            });
        }
        Ok(self.label_names.iter().cloned().zip(values).collect())
    }
}

/// Register a freshly built metric into its target registries.
pub(crate) fn register_all(metric: Arc<dyn Metric>, registers: Option<&[Registry]>) -> Result<()> {
    match registers {
        Some(list) => {
            for registry in list {
                registry.register_metric(Arc::clone(&metric))?;
            }
        }
        None => Registry::global().register_metric(metric)?,
    }
    Ok(())
}

/// Run an optional collector, logging a failure before propagating it.
pub(crate) async fn run_collect<M: Sync>(
    collector: Option<&Arc<dyn Collect<M>>>,
    metric: &M,
    name: &str,
) -> Result<()> {
    if let Some(c) = collector {
        if let Err(e) = c.collect(metric).await {
            tracing::warn!(metric = %name, error = %e, "collect failed");
            return Err(e);
        }
    }
    Ok(())
}

/// One storage slot: the label set it was created with plus kind-specific data.
pub(crate) struct Slot<T> {
    pub(crate) labels: LabelSet,
    pub(crate) data: T,
}

/// `LabelKey -> Slot` map owned by one metric.
pub(crate) struct LabelStore<T> {
    map: DashMap<LabelKey, Slot<T>>,
}

impl<T> Default for LabelStore<T> {
    fn default() -> Self {
        Self { map: DashMap::new() }
    }
}

impl<T> LabelStore<T> {
    /// Mutate the slot at `key`, creating it with `init` on first use.
    pub(crate) fn update<I, F>(&self, key: LabelKey, labels: &LabelSet, init: I, f: F)
    where
        I: FnOnce() -> T,
        F: FnOnce(&mut T),
    {
        let mut slot = self.map.entry(key).or_insert_with(|| Slot {
            labels: labels.clone(),
            data: init(),
        });
        f(&mut slot.data);
    }

    /// Drop the slot at `key`. When `seed` is given and `key` is the empty key,
    /// the slot is re-created with it so label-less metrics keep their zero record.
    pub(crate) fn remove(&self, key: &LabelKey, seed: Option<T>) {
        self.map.remove(key);
        if let Some(data) = seed.filter(|_| *key == LabelKey::empty()) {
            self.map.insert(LabelKey::empty(), Slot { labels: LabelSet::new(), data });
        }
    }

    /// Clear everything, then pre-seed the empty key when `seed` is given.
    pub(crate) fn reset(&self, seed: Option<T>) {
        self.map.clear();
        if let Some(data) = seed {
            self.map.insert(LabelKey::empty(), Slot { labels: LabelSet::new(), data });
        }
    }

    /// Visit every slot in Label Key order.
    pub(crate) fn collect_sorted<R, F>(&self, mut f: F) -> Vec<R>
    where
        F: FnMut(&LabelSet, &T) -> Vec<R>,
    {
        let mut slots: Vec<(LabelKey, Vec<R>)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), f(&r.value().labels, &r.value().data)))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        slots.into_iter().flat_map(|(_, rs)| rs).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}
