use serde::Serialize;
use serde_json::{Map, Value};

use crate::compose::RunPlan;
use procem_model::RunDefinition;

/// Routing key of the run-start announcement.
pub const START_TOPIC: &str = "Start";

/// Run-start announcement on the management exchange.
///
/// Static component types appear as extra top-level keys holding their instances.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartMessage {
    pub timestamp: String,
    pub simulation_id: String,
    pub simulation_specific_exchange: String,
    pub simulation_name: String,
    pub simulation_description: String,
    #[serde(flatten)]
    pub static_components: Map<String, Value>,
}

impl StartMessage {
    pub fn new(timestamp: impl Into<String>, plan: &RunPlan, def: &RunDefinition) -> Self {
        Self {
            timestamp: timestamp.into(),
            simulation_id: plan.identity.simulation_id.clone(),
            simulation_specific_exchange: plan.identity.endpoint.clone(),
            simulation_name: def.simulation.name.clone(),
            simulation_description: def.simulation.description.clone(),
            static_components: plan.static_components.clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
