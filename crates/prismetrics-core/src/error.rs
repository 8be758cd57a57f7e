//! Shared error type across prismetrics crates.

use thiserror::Error;

/// Error classes surfaced to integrators (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad metric definition or registration; fatal at construction time.
    Configuration,
    /// Bad call on a valid metric; stored state is left untouched.
    Usage,
    /// A user-supplied collector failed during `get()`.
    Collection,
    /// Malformed snapshot payload.
    Snapshot,
}

impl ErrorKind {
    /// String representation used in logs and test assertions.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Usage => "USAGE",
            ErrorKind::Collection => "COLLECTION",
            ErrorKind::Snapshot => "SNAPSHOT",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core and cluster.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("missing mandatory name parameter")]
    MissingName,
    #[error("missing mandatory help parameter")]
    MissingHelp,
    #[error("invalid metric name: {0}")]
    InvalidMetricName(String),
    #[error("invalid label name: {0}")]
    InvalidLabelName(String),
    #[error("invalid metric options: {0}")]
    InvalidOptions(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
    #[error("a metric with the name {0} has already been registered")]
    DuplicateMetric(String),
    #[error("added label \"{label}\" is not included in initial labelset: {allowed:?}")]
    UnknownLabel { label: String, allowed: Vec<String> },
    #[error("invalid number of arguments: expected {expected}, got {got}")]
    ArgumentCount { expected: usize, got: usize },
    #[error("it is not possible to decrease a counter")]
    CounterDecrease,
    #[error("value is not a valid number: {0}")]
    InvalidValue(f64),
    #[error("no metric registered under the name {0}")]
    UnknownMetric(String),
    #[error("collect failed: {0}")]
    Collect(String),
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

impl MetricsError {
    /// Map the error to its integrator-facing class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricsError::MissingName
            | MetricsError::MissingHelp
            | MetricsError::InvalidMetricName(_)
            | MetricsError::InvalidLabelName(_)
            | MetricsError::InvalidOptions(_)
            | MetricsError::InvalidConfig(_)
            | MetricsError::UnsupportedVersion(_)
            | MetricsError::DuplicateMetric(_) => ErrorKind::Configuration,
            MetricsError::UnknownLabel { .. }
            | MetricsError::ArgumentCount { .. }
            | MetricsError::CounterDecrease
            | MetricsError::InvalidValue(_)
            | MetricsError::UnknownMetric(_) => ErrorKind::Usage,
            MetricsError::Collect(_) => ErrorKind::Collection,
            MetricsError::Snapshot(_) => ErrorKind::Snapshot,
        }
    }
}

impl From<serde_json::Error> for MetricsError {
    fn from(e: serde_json::Error) -> Self {
        MetricsError::Snapshot(e.to_string())
    }
}
