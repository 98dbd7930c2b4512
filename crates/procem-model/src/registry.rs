//! Worker type registry: which component types a run definition may use.
use std::{collections::BTreeMap, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{ImageRef, ModelError, run::scalar_to_env};

/// How the platform deploys a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentClass {
    /// Part of the platform itself (manager, log writer); never user-launched.
    Core,
    /// Launched as a unit by this engine; has an image.
    Dynamic,
    /// Managed externally; only announced on the management bus.
    Static,
}

impl FromStr for DeploymentClass {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(DeploymentClass::Core),
            "dynamic" => Ok(DeploymentClass::Dynamic),
            "static" => Ok(DeploymentClass::Static),
            other => Err(ModelError::InvalidRegistry(format!(
                "unknown deployment class {other:?} (expected: core|dynamic|static)"
            ))),
        }
    }
}

/// Declared input attribute of a worker type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Environment variable receiving the value; the attribute name when `None`.
    pub environment: Option<String>,
    pub optional: bool,
    pub default: Option<String>,
}

/// One registered component type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerType {
    pub name: String,
    pub class: DeploymentClass,
    pub description: String,
    pub image: Option<ImageRef>,
    pub attributes: BTreeMap<String, AttributeSpec>,
    pub include_bus_parameters: bool,
    pub include_store_parameters: bool,
    pub include_common_parameters: bool,
}

impl WorkerType {
    /// Dynamic type with default injection flags and no declared attributes.
    pub fn dynamic(name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            name: name.into(),
            class: DeploymentClass::Dynamic,
            description: String::new(),
            image: Some(image),
            attributes: BTreeMap::new(),
            include_bus_parameters: true,
            include_store_parameters: false,
            include_common_parameters: true,
        }
    }

    /// Static type: announced only, never launched.
    pub fn announced(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: DeploymentClass::Static,
            description: String::new(),
            image: None,
            attributes: BTreeMap::new(),
            include_bus_parameters: false,
            include_store_parameters: false,
            include_common_parameters: false,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.attributes.insert(name.into(), spec);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.class == DeploymentClass::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.class == DeploymentClass::Static
    }

    /// Whether instance attributes are checked against a declared set.
    pub fn declares_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RawAttribute {
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RawWorkerType {
    #[serde(rename = "Type")]
    class: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    docker_image: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, RawAttribute>,
    #[serde(default = "yes")]
    include_rabbitmq_parameters: bool,
    #[serde(default)]
    include_mongodb_parameters: bool,
    #[serde(default = "yes")]
    include_general_parameters: bool,
}

fn yes() -> bool {
    true
}

impl RawWorkerType {
    fn into_worker_type(self, name: &str) -> Result<WorkerType, ModelError> {
        let class: DeploymentClass = self.class.parse()?;
        let image = match (class, self.docker_image.as_deref()) {
            (DeploymentClass::Static, _) => None,
            (_, Some(raw)) if !raw.trim().is_empty() => Some(raw.parse()?),
            (DeploymentClass::Dynamic, _) => {
                return Err(ModelError::InvalidRegistry(format!(
                    "dynamic type {name:?} has no image"
                )));
            }
            (DeploymentClass::Core, _) => None,
        };

        let attributes = self
            .attributes
            .into_iter()
            .map(|(attr, raw)| {
                let spec = AttributeSpec {
                    environment: raw.environment.filter(|e| !e.trim().is_empty()),
                    optional: raw.optional,
                    default: raw.default.as_ref().and_then(scalar_to_env),
                };
                (attr, spec)
            })
            .collect();

        Ok(WorkerType {
            name: name.to_string(),
            class,
            description: self.description,
            image,
            attributes,
            include_bus_parameters: self.include_rabbitmq_parameters,
            include_store_parameters: self.include_mongodb_parameters,
            include_common_parameters: self.include_general_parameters,
        })
    }
}

/// Known component types, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerRegistry {
    types: BTreeMap<String, WorkerType>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, worker: WorkerType) {
        self.types.insert(worker.name.clone(), worker);
    }

    pub fn with(mut self, worker: WorkerType) -> Self {
        self.insert(worker);
        self
    }

    pub fn get(&self, name: &str) -> Option<&WorkerType> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerType> {
        self.types.values()
    }

    /// Entries of `other` replace entries with the same name.
    pub fn merged(mut self, other: WorkerRegistry) -> Self {
        self.types.extend(other.types);
        self
    }

    /// Build from the comma-separated platform lists.
    ///
    /// `dynamic` holds `Type:image[:tag]` entries, `statics` holds bare type names.
    /// Malformed dynamic entries are skipped.
    pub fn from_env_lists(dynamic: &str, statics: &str) -> Self {
        let mut registry = Self::new();

        for entry in dynamic.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((name, image)) = entry.split_once(':') else {
                warn!(entry, "skipping dynamic component without image");
                continue;
            };
            match image.parse::<ImageRef>() {
                Ok(image) if !name.trim().is_empty() => {
                    registry.insert(WorkerType::dynamic(name.trim(), image));
                }
                Ok(_) => warn!(entry, "skipping dynamic component without a type name"),
                Err(e) => warn!(entry, error = %e, "skipping dynamic component"),
            }
        }

        for name in statics.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            registry.insert(WorkerType::announced(name));
        }

        debug!(types = registry.len(), "registry built from platform lists");
        registry
    }

    /// Parse a YAML registry document.
    ///
    /// The document itself must parse; individual entries that are invalid are skipped.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ModelError> {
        let entries: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(raw)?;
        let mut registry = Self::new();

        for (name, value) in entries {
            let parsed = serde_yaml::from_value::<RawWorkerType>(value)
                .map_err(ModelError::from)
                .and_then(|raw| raw.into_worker_type(&name));
            match parsed {
                Ok(worker) => registry.insert(worker),
                Err(e) => warn!(component = %name, error = %e, "skipping registry entry"),
            }
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }
}
