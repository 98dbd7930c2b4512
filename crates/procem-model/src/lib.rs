//! Data model of the simulation platform manager.
//!
//! Everything here is plain data plus the loaders that turn run definitions and
//! worker registries into it; no I/O beyond reading files.

mod error;
pub use error::ModelError;

mod slot;
pub use slot::{DEFAULT_SLOT_PREFIX, DEFAULT_SLOT_WIDTH, RunSlot, SlotLayout};

mod image;
pub use image::{DEFAULT_IMAGE_TAG, ImageRef};

mod env;
pub use env::{KeyValue, UnitEnv};

mod unit;
pub use unit::{UnitRole, UnitSpec, VolumeBinding, VolumeMode};

pub mod run;
pub use run::{
    Components, DUPLICATION_COUNT, GeneralConfig, InstanceConfig, InstanceGroup, RunDefinition,
};

pub mod registry;
pub use registry::{AttributeSpec, DeploymentClass, WorkerRegistry, WorkerType};

pub mod timestamp;
