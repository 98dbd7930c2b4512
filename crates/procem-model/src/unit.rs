use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ImageRef, UnitEnv};

/// Role a unit plays inside one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitRole {
    /// Drives epochs; exactly one per run, always started last.
    Manager,
    /// Persists bus traffic; exactly one per run, always started first.
    LogWriter,
    /// User-declared dynamic component.
    Worker,
}

impl UnitRole {
    /// Short identifier for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitRole::Manager => "manager",
            UnitRole::LogWriter => "log_writer",
            UnitRole::Worker => "worker",
        }
    }
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    Rw,
    Ro,
}

impl VolumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeMode::Rw => "rw",
            VolumeMode::Ro => "ro",
        }
    }
}

/// Mount of a named volume into a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<VolumeMode>,
}

impl VolumeBinding {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: VolumeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Engine-native bind string: `source:target[:mode]`.
    pub fn to_bind(&self) -> String {
        match self.mode {
            Some(mode) => format!("{}:{}:{}", self.source, self.target, mode.as_str()),
            None => format!("{}:{}", self.source, self.target),
        }
    }
}

/// Engine-agnostic description of one launchable unit.
///
/// `name` is the run-local name; the launcher prepends the slot prefix.
/// The first network is used at creation time, the rest are attached afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSpec {
    pub name: String,
    pub role: UnitRole,
    pub image: ImageRef,
    pub env: UnitEnv,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeBinding>,
}

impl UnitSpec {
    pub fn new(name: impl Into<String>, role: UnitRole, image: ImageRef) -> Self {
        Self {
            name: name.into(),
            role,
            image,
            env: UnitEnv::new(),
            networks: Vec::new(),
            volumes: Vec::new(),
        }
    }

    pub fn with_env(mut self, env: UnitEnv) -> Self {
        self.env = env;
        self
    }

    pub fn with_networks(mut self, networks: Vec<String>) -> Self {
        self.networks = networks;
        self
    }

    pub fn with_volumes(mut self, volumes: Vec<VolumeBinding>) -> Self {
        self.volumes = volumes;
        self
    }

    /// Network used when the unit is created, if any.
    pub fn primary_network(&self) -> Option<&str> {
        self.networks.first().map(String::as_str)
    }

    /// Networks that have to be attached after creation.
    pub fn secondary_networks(&self) -> &[String] {
        self.networks.get(1..).unwrap_or(&[])
    }

    pub fn binds(&self) -> Vec<String> {
        self.volumes.iter().map(VolumeBinding::to_bind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageRef {
        ImageRef::new("procem/worker", "latest")
    }

    #[test]
    fn networks_split_into_primary_and_secondary() {
        let spec = UnitSpec::new("Load", UnitRole::Worker, image()).with_networks(vec![
            "platform".into(),
            "rabbitmq".into(),
            "mongodb".into(),
        ]);
        assert_eq!(spec.primary_network(), Some("platform"));
        assert_eq!(spec.secondary_networks(), ["rabbitmq", "mongodb"]);
    }

    #[test]
    fn no_networks_means_no_primary() {
        let spec = UnitSpec::new("Load", UnitRole::Worker, image());
        assert_eq!(spec.primary_network(), None);
        assert!(spec.secondary_networks().is_empty());
    }

    #[test]
    fn bind_strings_include_optional_mode() {
        let spec = UnitSpec::new("Load", UnitRole::Worker, image()).with_volumes(vec![
            VolumeBinding::new("resources", "/resources").with_mode(VolumeMode::Ro),
            VolumeBinding::new("logs", "/logs"),
        ]);
        assert_eq!(spec.binds(), vec!["resources:/resources:ro", "logs:/logs"]);
    }
}
