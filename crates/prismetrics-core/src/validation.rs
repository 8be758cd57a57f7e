//! Name validation.
//!
//! Patterns follow the Prometheus data model:
//! <https://prometheus.io/docs/concepts/data_model/#metric-names-and-labels>

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MetricsError, Result};
use crate::labels::LabelSet;

#[allow(clippy::expect_used)]
static METRIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("static metric name pattern"));

#[allow(clippy::expect_used)]
static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static label name pattern"));

pub fn validate_metric_name(name: &str) -> bool {
    METRIC_RE.is_match(name)
}

pub fn validate_label_name(name: &str) -> bool {
    LABEL_RE.is_match(name)
}

/// True when every name matches the label-name pattern.
pub fn validate_label_names<S: AsRef<str>>(names: &[S]) -> bool {
    names.iter().all(|n| validate_label_name(n.as_ref()))
}

/// Reject a label set that uses names outside the declared `allowed` set.
pub fn validate_labels(allowed: &[String], labels: &LabelSet) -> Result<()> {
    for name in labels.names() {
        if !allowed.iter().any(|a| a == name) {
            return Err(MetricsError::UnknownLabel {
                label: name.to_string(),
                allowed: allowed.to_vec(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn metric_names() {
        for ok in ["up", "http_requests_total", ":recording:rule", "_x9"] {
            assert!(validate_metric_name(ok), "{ok}");
        }
        for bad in ["", "9lives", "with-dash", "spa ce", "ünicode"] {
            assert!(!validate_metric_name(bad), "{bad}");
        }
    }

    #[test]
    fn label_names_reject_colon() {
        assert!(validate_label_names(&["method", "_code"]));
        assert!(!validate_label_names(&["method", "a:b"]));
        assert!(validate_label_names::<&str>(&[]));
    }

    #[test]
    fn unknown_label_is_a_usage_error() {
        let allowed = vec!["method".to_string()];
        assert!(validate_labels(&allowed, &LabelSet::from([("method", "GET")])).is_ok());

        let err = validate_labels(&allowed, &LabelSet::from([("path", "/")])).unwrap_err();
        assert_eq!(err.kind().as_str(), "USAGE");
        assert!(err.to_string().contains("\"path\""));
    }
}
