use serde::Deserialize;

use prismetrics_core::error::{MetricsError, Result};
use prismetrics_core::validation::validate_label_name;
use prismetrics_core::{LabelSet, Registry};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub version: u32,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub cluster: ClusterSection,
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::UnsupportedVersion(self.version));
        }

        self.registry.validate()?;
        self.cluster.validate()?;

        Ok(())
    }

    /// Install this config's default labels on `registry`.
    pub fn apply(&self, registry: &Registry) {
        registry.set_default_labels(self.registry.default_labels.clone());
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    #[serde(default)]
    pub default_labels: LabelSet,
}

impl RegistrySection {
    pub fn validate(&self) -> Result<()> {
        for name in self.default_labels.names() {
            check_label("registry.default_labels", name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterSection {
    /// Label that keeps `omit` samples from different workers apart.
    #[serde(default = "default_worker_label")]
    pub worker_label: String,

    /// Labels dropped from every record before grouping.
    #[serde(default)]
    pub strip_labels: Vec<String>,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            worker_label: default_worker_label(),
            strip_labels: Vec::new(),
        }
    }
}

impl ClusterSection {
    pub fn validate(&self) -> Result<()> {
        check_label("cluster.worker_label", &self.worker_label)?;
        for name in &self.strip_labels {
            check_label("cluster.strip_labels", name)?;
        }
        Ok(())
    }
}

fn check_label(field: &str, name: &str) -> Result<()> {
    if !validate_label_name(name) {
        return Err(MetricsError::InvalidConfig(format!(
            "{field}: invalid label name {name:?}"
        )));
    }
    Ok(())
}

fn default_worker_label() -> String {
    "worker".into()
}
