//! Run definition: the user-supplied description of one simulation run.
use std::{collections::HashSet, fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ModelError, timestamp::normalize_timestamp};

/// Instance name to configuration, in document order.
pub type InstanceGroup = IndexMap<String, InstanceConfig>;

/// Worker type name to its instances, in document order.
pub type Components = IndexMap<String, InstanceGroup>;

/// Reserved instance attribute holding the number of identical units to launch.
pub const DUPLICATION_COUNT: &str = "duplication_count";

fn default_run_name() -> String {
    "simulation".to_string()
}

fn one() -> u32 {
    1
}

/// General parameters of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_run_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub initial_start_time: String,
    pub epoch_length: u64,
    pub max_epoch_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_timer_interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_epoch_resend_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_buffer_max_document_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_buffer_max_interval: Option<f64>,
}

/// Configuration of one named instance of a worker type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default = "one")]
    pub duplication_count: u32,
    /// User attributes, in document order.
    #[serde(flatten)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            duplication_count: 1,
            attributes: IndexMap::new(),
        }
    }
}

impl InstanceConfig {
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_duplication(mut self, count: u32) -> Self {
        self.duplication_count = count;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RawRunDefinition {
    simulation: GeneralConfig,
    /// `Components:` and a type group may both be left empty (null) in YAML.
    #[serde(default)]
    components: Option<IndexMap<String, Option<IndexMap<String, Option<InstanceConfig>>>>>,
}

/// Parsed and validated run definition.
///
/// `components` maps worker type name to instance name to instance configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunDefinition {
    pub simulation: GeneralConfig,
    pub components: Components,
}

impl RunDefinition {
    pub fn new(simulation: GeneralConfig) -> Self {
        Self {
            simulation,
            components: Components::new(),
        }
    }

    /// Add an instance under a worker type, creating the type group if needed.
    pub fn with_instance(
        mut self,
        worker_type: &str,
        instance: impl Into<String>,
        config: InstanceConfig,
    ) -> Self {
        let mut group = self.components.get(worker_type).cloned().unwrap_or_default();
        group.insert(instance.into(), config);
        self.components.insert(worker_type.to_string(), group);
        self
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ModelError> {
        let parsed: RawRunDefinition = serde_yaml::from_str(raw)?;
        Self::from_raw(parsed)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ModelError> {
        let parsed: RawRunDefinition = serde_json::from_str(raw)?;
        Self::from_raw(parsed)
    }

    /// Load from a file; `.json` files are parsed as JSON, everything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_yaml_str(&raw)
        }
    }

    fn from_raw(raw: RawRunDefinition) -> Result<Self, ModelError> {
        let components: Components = raw
            .components
            .unwrap_or_default()
            .into_iter()
            .map(|(worker_type, instances)| {
                let instances: InstanceGroup = instances
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(name, cfg)| (name, cfg.unwrap_or_default()))
                    .collect();
                (worker_type, instances)
            })
            .collect();

        let def = Self {
            simulation: raw.simulation,
            components,
        };
        def.validate()?;
        Ok(def)
    }

    /// Check everything that can be checked without the worker registry.
    pub fn validate(&self) -> Result<(), ModelError> {
        let sim = &self.simulation;
        if sim.epoch_length == 0 {
            return Err(invalid("EpochLength must be positive"));
        }
        if sim.max_epoch_count == 0 {
            return Err(invalid("MaxEpochCount must be positive"));
        }
        normalize_timestamp(&sim.initial_start_time)?;
        if let Some(name) = &sim.manager_name
            && !is_unit_name(name)
        {
            return Err(invalid(format!("invalid ManagerName {name:?}")));
        }

        let mut seen = HashSet::new();
        for (worker_type, instances) in self.components.iter() {
            for (name, cfg) in instances.iter() {
                if !is_unit_name(name) {
                    return Err(invalid(format!(
                        "invalid instance name {name:?} for component type {worker_type}"
                    )));
                }
                if cfg.duplication_count == 0 {
                    return Err(invalid(format!(
                        "{DUPLICATION_COUNT} of {worker_type}/{name} must be at least 1"
                    )));
                }
                if !seen.insert(name) {
                    return Err(invalid(format!("instance name {name:?} is declared twice")));
                }
            }
        }
        Ok(())
    }

    /// Initial start time in the millisecond UTC form.
    pub fn normalized_start_time(&self) -> Result<String, ModelError> {
        normalize_timestamp(&self.simulation.initial_start_time)
    }
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::InvalidRunDefinition(msg.into())
}

/// Unit names must be usable as container names: `[A-Za-z0-9][A-Za-z0-9_.-]*`.
pub fn is_unit_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Environment variable names: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_env_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Render a scalar attribute value as an environment value.
///
/// Returns `None` for null, sequences and maps.
pub fn scalar_to_env(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
