use std::{sync::Arc, time::Duration};

use procem_model::UnitRole;

use crate::CoreError;

/// How a launch attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Success,
    Configuration,
    CapacityExhausted,
    EngineFailure,
    AnnounceFailure,
    Stopped,
}

impl LaunchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchOutcome::Success => "success",
            LaunchOutcome::Configuration => "configuration_error",
            LaunchOutcome::CapacityExhausted => "capacity_exhausted",
            LaunchOutcome::EngineFailure => "engine_failure",
            LaunchOutcome::AnnounceFailure => "announce_failure",
            LaunchOutcome::Stopped => "stopped",
        }
    }

    pub fn of<T>(result: &Result<T, CoreError>) -> Self {
        match result {
            Ok(_) => LaunchOutcome::Success,
            Err(CoreError::Configuration(_)) => LaunchOutcome::Configuration,
            Err(CoreError::CapacityExhausted { .. }) => LaunchOutcome::CapacityExhausted,
            Err(CoreError::Engine { .. }) => LaunchOutcome::EngineFailure,
            Err(CoreError::Announce { .. }) => LaunchOutcome::AnnounceFailure,
            Err(CoreError::Stopped) => LaunchOutcome::Stopped,
        }
    }
}

/// Sink for launch metrics.
pub trait MetricsBackend: Send + Sync + 'static {
    fn record_launch(&self, outcome: LaunchOutcome, duration: Duration);

    fn record_unit_started(&self, role: UnitRole);

    /// Number of slots observed in use at the last allocation.
    fn record_slots_in_use(&self, count: usize);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_launch(&self, _outcome: LaunchOutcome, _duration: Duration) {}

    fn record_unit_started(&self, _role: UnitRole) {}

    fn record_slots_in_use(&self, _count: usize) {}
}

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoopMetrics)
}
