//! Container engine seam.
use async_trait::async_trait;
use procem_model::UnitSpec;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unit not found: {0}")]
    NotFound(String),
    #[error("name already in use: {0}")]
    Conflict(String),
    #[error("engine rejected request: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no answer within {timeout_ms} ms")]
    Deadline { timeout_ms: u64 },
    #[error("engine connection is closed")]
    Closed,
}

impl EngineError {
    /// The request may have been applied even though no answer arrived.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, EngineError::Deadline { .. } | EngineError::Transport(_))
    }
}

/// A unit as reported by the engine's running-unit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningUnit {
    pub id: String,
    pub name: String,
}

/// Handle returned by a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHandle {
    pub id: String,
    pub name: String,
}

/// Everything the engine needs to create one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUnit {
    /// Slot-prefixed name.
    pub name: String,
    /// `name:tag`.
    pub image: String,
    /// `KEY=VALUE` entries.
    pub env: Vec<String>,
    pub primary_network: Option<String>,
    /// `source:target[:mode]` bind strings.
    pub binds: Vec<String>,
    pub auto_remove: bool,
}

impl CreateUnit {
    /// Flatten a spec into a create request under its full (slot-prefixed) name.
    pub fn from_spec(full_name: impl Into<String>, spec: &UnitSpec) -> Self {
        Self {
            name: full_name.into(),
            image: spec.image.full_name(),
            env: spec.env.to_entries(),
            primary_network: spec.primary_network().map(str::to_string),
            binds: spec.binds(),
            auto_remove: true,
        }
    }
}

/// Operations the launcher needs from a container engine.
///
/// Implementations only translate calls; deadlines and locking live in the launcher.
#[async_trait]
pub trait ContainerEngine: Send + Sync + 'static {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    async fn list_running(&self) -> Result<Vec<RunningUnit>, EngineError>;

    /// Create (not start) a unit. An existing unit with the same name is replaced.
    async fn create(&self, request: &CreateUnit) -> Result<UnitHandle, EngineError>;

    async fn attach_network(&self, unit: &str, network: &str) -> Result<(), EngineError>;

    async fn start(&self, unit: &UnitHandle) -> Result<(), EngineError>;

    /// Stop a unit. Stopping a unit that is not running is not an error.
    async fn stop(&self, unit: &str) -> Result<(), EngineError>;

    /// Remove a unit. Removing a unit that no longer exists is not an error.
    async fn remove(&self, unit: &str) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use procem_model::{ImageRef, UnitEnv, UnitRole, VolumeBinding};

    use super::*;

    #[test]
    fn create_request_flattens_spec() {
        let spec = UnitSpec::new("Load_1", UnitRole::Worker, ImageRef::new("procem/load", "1"))
            .with_env(UnitEnv::new().with("A", "1").with("B", "x").with("A", "2"))
            .with_networks(vec!["platform".into(), "bus".into()])
            .with_volumes(vec![VolumeBinding::new("logs", "/logs")]);

        let request = CreateUnit::from_spec("Sim03_Load_1", &spec);
        assert_eq!(request.name, "Sim03_Load_1");
        assert_eq!(request.image, "procem/load:1");
        assert_eq!(request.env, vec!["A=2", "B=x"]);
        assert_eq!(request.primary_network.as_deref(), Some("platform"));
        assert_eq!(request.binds, vec!["logs:/logs"]);
        assert!(request.auto_remove);
    }
}
