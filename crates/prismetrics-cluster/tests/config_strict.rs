#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use prismetrics_cluster::config;
use prismetrics_core::{LabelValue, Registry};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
cluster:
  worker_labl: worker # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIGURATION");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.cluster.worker_label, "worker");
    assert!(cfg.cluster.strip_labels.is_empty());
    assert!(cfg.registry.default_labels.is_empty());
}

#[test]
fn rejects_unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert!(err.to_string().contains("unsupported config version: 2"));
}

#[test]
fn rejects_invalid_label_names() {
    for bad in [
        "version: 1\nregistry:\n  default_labels: { \"bad-name\": x }\n",
        "version: 1\ncluster:\n  worker_label: \"9worker\"\n",
        "version: 1\ncluster:\n  strip_labels: [\"a:b\"]\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.kind().as_str(), "CONFIGURATION", "{bad}");
    }
}

#[test]
fn apply_installs_default_labels() {
    let cfg = config::load_from_str("version: 1\nregistry:\n  default_labels:\n    region: eu\n    shard: 3\n").unwrap();
    let reg = Registry::new();
    cfg.apply(&reg);

    let labels = reg.default_labels();
    assert_eq!(labels.get("region"), Some(&LabelValue::from("eu")));
    assert_eq!(labels.get("shard"), Some(&LabelValue::from(3)));
}
