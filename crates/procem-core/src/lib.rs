//! Run orchestration for the simulation platform.
//!
//! A run goes through four stages:
//! - [`ConfigComposer`] validates a [`procem_model::RunDefinition`] against the worker
//!   registry and turns it into ordered [`procem_model::UnitSpec`]s;
//! - [`SlotAllocator`] picks the smallest free run slot from the engine's live units;
//! - [`Launcher`] creates, connects and starts the units under one process-wide lock;
//! - [`RunCoordinator`] ties these together and announces the run on the management bus.
//!
//! The container engine, message bus and metrics sink are traits so the HTTP
//! adapters live in their own crates.

mod error;
pub use error::CoreError;

pub mod vars;

pub mod config;
pub use config::{
    BusSettings, CommonSettings, EngineSettings, LauncherSettings, LogWriterSettings,
    ManagerSettings, PlatformConfig, StoreSettings,
};

pub mod engine;
pub use engine::{ContainerEngine, CreateUnit, EngineError, RunningUnit, UnitHandle};

pub mod bus;
pub use bus::{MessageBus, PublishError};

pub mod metrics;
pub use metrics::{LaunchOutcome, MetricsBackend, MetricsHandle, NoopMetrics};

mod slot;
pub use slot::{Allocation, SlotAllocator};

pub mod compose;
pub use compose::{ConfigComposer, RunIdentity, RunPlan};

mod launcher;
pub use launcher::{LaunchedRun, Launcher, RollbackPolicy};

mod announce;
pub use announce::{START_TOPIC, StartMessage};

mod coordinator;
pub use coordinator::{LaunchReport, RunCoordinator};

#[cfg(test)]
mod testing;
