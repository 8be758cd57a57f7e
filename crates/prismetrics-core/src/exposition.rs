//! Prometheus text exposition (format version 0.0.4).
//!
//! ```text
//! # HELP <name> <help>
//! # TYPE <name> <type>
//! <series>{<label>="<value>",...} <value>
//! ```

use std::fmt::Write;

use crate::labels::{LabelSet, LabelValue};
use crate::snapshot::MetricSnapshot;
use crate::value::format_value;

/// Escape a metric name or help text.
///
/// Newlines become `\n`; every backslash not already followed by `n` is doubled.
pub fn escape_string(s: &str) -> String {
    let s = s.replace('\n', "\\n");
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '\\' && chars.peek() != Some(&'n') {
            out.push('\\');
        }
    }
    out
}

/// Escape a label value: [`escape_string`] plus `"` -> `\"`. Numbers pass through.
pub fn escape_label_value(v: &LabelValue) -> String {
    match v {
        LabelValue::Str(s) => escape_string(s).replace('"', "\\\""),
        LabelValue::Num(n) => format_value(*n),
    }
}

/// Render one metric block, with `defaults` appended to every sample that does
/// not define them. The result has no trailing whitespace.
pub fn render_metric(snapshot: &MetricSnapshot, defaults: &LabelSet) -> String {
    let name = escape_string(&snapshot.name);
    let mut out = String::new();
    let _ = writeln!(out, "# HELP {} {}", name, escape_string(&snapshot.help));
    let _ = writeln!(out, "# TYPE {} {}", name, snapshot.metric_type.as_str());

    for obs in &snapshot.values {
        let labels = obs.labels.with_defaults(defaults);
        let series = obs.metric_name.as_deref().unwrap_or(&snapshot.name);
        let _ = writeln!(out, "{}{} {}", series, render_labels(&labels), format_value(obs.value));
    }

    out.trim().to_string()
}

fn render_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let body = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{body}}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Aggregator, MetricType};
    use crate::snapshot::Observation;

    fn snapshot(values: Vec<Observation>) -> MetricSnapshot {
        MetricSnapshot {
            name: "http_requests_total".into(),
            help: "Total requests".into(),
            metric_type: MetricType::Counter,
            aggregator: Aggregator::Sum,
            values,
        }
    }

    #[test]
    fn escapes_help_text() {
        assert_eq!(escape_string("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_string(r"C:\path"), r"C:\\path");
        // a backslash already followed by `n` is left alone
        assert_eq!(escape_string(r"a\nb"), r"a\nb");
    }

    #[test]
    fn escapes_label_quotes() {
        assert_eq!(escape_label_value(&LabelValue::from(r#"say "hi""#)), r#"say \"hi\""#);
        assert_eq!(escape_label_value(&LabelValue::from(404)), "404");
    }

    #[test]
    fn renders_labels_in_record_order() {
        let snap = snapshot(vec![Observation::new(
            3.0,
            LabelSet::new().with("method", "GET").with("code", 200),
        )]);
        assert_eq!(
            render_metric(&snap, &LabelSet::new()),
            "# HELP http_requests_total Total requests\n\
             # TYPE http_requests_total counter\n\
             http_requests_total{method=\"GET\",code=\"200\"} 3"
        );
    }

    #[test]
    fn omits_braces_without_labels_and_uses_series_name() {
        let snap = snapshot(vec![
            Observation::new(f64::NAN, LabelSet::new()),
            Observation::new(f64::NEG_INFINITY, LabelSet::new()).with_metric_name("x_sum"),
        ]);
        let text = render_metric(&snap, &LabelSet::new());
        assert!(text.ends_with("http_requests_total Nan\nx_sum -Inf"));
    }

    #[test]
    fn default_labels_are_appended_not_overriding() {
        let snap = snapshot(vec![
            Observation::new(1.0, LabelSet::new()),
            Observation::new(2.0, LabelSet::from([("region", "us")])),
        ]);
        let defaults = LabelSet::from([("region", "eu")]);
        let text = render_metric(&snap, &defaults);
        assert!(text.contains("http_requests_total{region=\"eu\"} 1\n"));
        assert!(text.ends_with("http_requests_total{region=\"us\"} 2"));
        // stored record untouched
        assert!(snap.values[0].labels.is_empty());
    }

    #[test]
    fn empty_metric_renders_headers_only() {
        let text = render_metric(&snapshot(vec![]), &LabelSet::new());
        assert_eq!(text, "# HELP http_requests_total Total requests\n# TYPE http_requests_total counter");
    }
}
