use procem_model::{ModelError, RunSlot};
use thiserror::Error;

use crate::{bus::PublishError, engine::EngineError};

#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid input; nothing has been touched.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every slot is occupied; nothing has been touched.
    #[error("no free run slot (capacity {capacity})")]
    CapacityExhausted { capacity: u32 },

    /// A container-engine call failed part way through a launch or teardown.
    ///
    /// `left_running` holds the slot-prefixed units this call created and did not clean up.
    #[error("container engine failed to {operation} {unit}: {source}")]
    Engine {
        operation: &'static str,
        unit: String,
        #[source]
        source: EngineError,
        left_running: Vec<String>,
    },

    /// All units were started but the run-start announcement was not published.
    #[error("run in slot {slot} started but its announcement failed: {source}")]
    Announce {
        slot: RunSlot,
        simulation_id: String,
        units: Vec<String>,
        #[source]
        source: PublishError,
    },

    #[error("platform manager is stopped")]
    Stopped,
}

impl CoreError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        CoreError::Configuration(msg.into())
    }

    /// Units that may still be running after this error.
    pub fn left_running(&self) -> &[String] {
        match self {
            CoreError::Engine { left_running, .. } => left_running,
            CoreError::Announce { units, .. } => units,
            _ => &[],
        }
    }
}

impl From<ModelError> for CoreError {
    fn from(e: ModelError) -> Self {
        CoreError::Configuration(e.to_string())
    }
}
