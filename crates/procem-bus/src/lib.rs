//! Management-channel publisher for the platform manager.
//!
//! Uses the broker's HTTP management API, so no AMQP connection is kept open.

mod error;
pub use error::BusError;

mod management;
pub use management::{ManagementBus, ManagementConfig};
