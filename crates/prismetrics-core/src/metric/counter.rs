//! Counter: a cumulative value that only ever goes up.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MetricsError, Result};
use crate::labels::{LabelKey, LabelSet, LabelValue};
use crate::snapshot::{MetricSnapshot, Observation};

use super::{register_all, run_collect, Aggregator, Collect, LabelStore, Metric, MetricCore, MetricId, MetricType, Opts};

struct CounterInner {
    core: MetricCore,
    store: LabelStore<f64>,
    collect: Option<Arc<dyn Collect<Counter>>>,
}

/// Counter handle. Clones share storage and identity.
#[derive(Clone)]
pub struct Counter {
    inner: Arc<CounterInner>,
}

impl Counter {
    /// Build, reset and register a counter.
    pub fn new(opts: Opts) -> Result<Self> {
        Self::build(opts, None)
    }

    /// Same as [`Counter::new`] with a collector run before every `get()`.
    pub fn with_collect(opts: Opts, collect: Arc<dyn Collect<Counter>>) -> Result<Self> {
        Self::build(opts, Some(collect))
    }

    fn build(opts: Opts, collect: Option<Arc<dyn Collect<Counter>>>) -> Result<Self> {
        let core = MetricCore::from_opts(&opts, &[])?;
        let counter = Self {
            inner: Arc::new(CounterInner { core, store: LabelStore::default(), collect }),
        };
        counter.reset();
        tracing::debug!(metric = %counter.name(), "counter created");
        register_all(Arc::new(counter.clone()), opts.registers.as_deref())?;
        Ok(counter)
    }

    /// Increment the label-less series by 1.
    pub fn inc(&self) {
        self.add(LabelKey::empty(), &LabelSet::new(), 1.0);
    }

    /// Increment the label-less series by `value`.
    pub fn inc_by(&self, value: f64) -> Result<()> {
        check_increment(value)?;
        self.add(LabelKey::empty(), &LabelSet::new(), value);
        Ok(())
    }

    /// Increment the series identified by `labels` by `value`.
    pub fn inc_with_labels(&self, labels: &LabelSet, value: f64) -> Result<()> {
        check_increment(value)?;
        let key = self.inner.core.resolve(labels)?;
        self.add(key, labels, value);
        Ok(())
    }

    /// Bind a label set for repeated increments.
    pub fn labels(&self, labels: &LabelSet) -> Result<CounterChild> {
        let key = self.inner.core.resolve(labels)?;
        Ok(CounterChild { counter: self.clone(), key, labels: labels.clone() })
    }

    /// Bind positional label values, matched against the declared label names.
    pub fn labels_values<I, V>(&self, values: I) -> Result<CounterChild>
    where
        I: IntoIterator<Item = V>,
        V: Into<LabelValue>,
    {
        let labels = self.inner.core.labels_from_values(values)?;
        self.labels(&labels)
    }

    /// Drop the series for `labels`; unknown series are ignored.
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

    // Label-less metrics always carry a zero record.
    fn zero_seed(&self) -> Option<f64> {
        self.inner.core.label_names.is_empty().then_some(0.0)
    }

    fn add(&self, key: LabelKey, labels: &LabelSet, value: f64) {
        self.inner.store.update(key, labels, || 0.0, |v| *v += value);
    }

    fn values(&self) -> Vec<Observation> {
        self.inner
            .store
            .collect_sorted(|labels, v| vec![Observation::new(*v, labels.clone())])
    }
}

fn check_increment(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(MetricsError::InvalidValue(value));
    }
    if value < 0.0 {
        return Err(MetricsError::CounterDecrease);
    }
    Ok(())
}

/// Counter bound to one label set.
#[derive(Clone)]
pub struct CounterChild {
    counter: Counter,
    key: LabelKey,
    labels: LabelSet,
}

impl CounterChild {
    pub fn inc(&self) {
        self.counter.add(self.key.clone(), &self.labels, 1.0);
    }

    pub fn inc_by(&self, value: f64) -> Result<()> {
        check_increment(value)?;
        self.counter.add(self.key.clone(), &self.labels, value);
        Ok(())
    }
}

#[async_trait]
impl Metric for Counter {
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
        MetricType::Counter
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
            metric_type: MetricType::Counter,
            aggregator: self.aggregator(),
            values: self.values(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn counter(labels: &[&str]) -> Counter {
        Counter::new(Opts::new("requests_total", "Requests").label_names(labels.iter().copied()).registers([]))
            .unwrap()
    }

    #[tokio::test]
    async fn starts_at_zero_without_labels() {
        let c = counter(&[]);
        let snap = c.get().await.unwrap();
        assert_eq!(snap.values, vec![Observation::new(0.0, LabelSet::new())]);
    }

    #[tokio::test]
    async fn removing_the_unlabeled_series_keeps_a_zero_record() {
        let c = counter(&[]);
        c.inc_by(4.0).unwrap();
        c.remove(&LabelSet::new()).unwrap();
        let snap = c.get().await.unwrap();
        assert_eq!(snap.values, vec![Observation::new(0.0, LabelSet::new())]);
    }

    #[tokio::test]
    async fn labeled_counter_starts_empty() {
        let c = counter(&["method"]);
        assert!(c.get().await.unwrap().values.is_empty());
    }

    #[tokio::test]
    async fn increments_accumulate() {
        let c = counter(&[]);
        c.inc();
        c.inc_by(2.5).unwrap();
        assert_eq!(c.get().await.unwrap().values[0].value, 3.5);
    }

    #[tokio::test]
    async fn negative_increment_fails_and_keeps_value() {
        let c = counter(&[]);
        c.inc_by(5.0).unwrap();

        let err = c.inc_by(-1.0).unwrap_err();
        assert!(matches!(err, MetricsError::CounterDecrease));
        assert_eq!(err.kind().as_str(), "USAGE");

        let err = c.inc_by(f64::INFINITY).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidValue(_)));
        let err = c.inc_by(f64::NAN).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidValue(_)));

        assert_eq!(c.get().await.unwrap().values[0].value, 5.0);
    }

    #[tokio::test]
    async fn label_order_does_not_split_series() {
        let c = counter(&["method", "code"]);
        c.inc_with_labels(&LabelSet::from([("method", "GET"), ("code", "200")]), 1.0).unwrap();
        c.inc_with_labels(&LabelSet::from([("code", "200"), ("method", "GET")]), 1.0).unwrap();
        c.labels_values(["GET", "200"]).unwrap().inc();

        let values = c.get().await.unwrap().values;
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 3.0);
    }

    #[tokio::test]
    async fn unknown_label_leaves_state_untouched() {
        let c = counter(&["method"]);
        let err = c.inc_with_labels(&LabelSet::from([("path", "/")]), 1.0).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownLabel { .. }));
        assert!(c.labels(&LabelSet::from([("path", "/")])).is_err());
        assert!(c.get().await.unwrap().values.is_empty());
    }

    #[tokio::test]
    async fn remove_drops_one_series() {
        let c = counter(&["method"]);
        c.labels_values(["GET"]).unwrap().inc();
        c.labels_values(["POST"]).unwrap().inc();
        c.remove_values(["GET"]).unwrap();
        c.remove_values(["PUT"]).unwrap();

        let values = c.get().await.unwrap().values;
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].labels, LabelSet::from([("method", "POST")]));

        assert!(matches!(c.remove_values(["a", "b"]), Err(MetricsError::ArgumentCount { .. })));
    }

    #[tokio::test]
    async fn collector_runs_before_snapshot() {
        let c = Counter::with_collect(
            Opts::new("collected_total", "help").registers([]),
            crate::metric::collect_fn(|c: &Counter| c.inc_by(10.0)),
        )
        .unwrap();
        assert_eq!(c.get().await.unwrap().values[0].value, 10.0);
        assert_eq!(c.get().await.unwrap().values[0].value, 20.0);
    }

    #[tokio::test]
    async fn collector_failure_propagates() {
        let c = Counter::with_collect(
            Opts::new("broken_total", "help").registers([]),
            crate::metric::collect_fn(|_: &Counter| Err(MetricsError::Collect("boom".into()))),
        )
        .unwrap();
        let err = c.get().await.unwrap_err();
        assert_eq!(err.kind().as_str(), "COLLECTION");
    }
}
