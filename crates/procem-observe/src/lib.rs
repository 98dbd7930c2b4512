//! Process logging for the platform binaries.
//!
//! ```no_run
//! use procem_observe::{LoggerConfig, logger_init};
//!
//! let cfg = LoggerConfig::from_lookup(|key| std::env::var(key).ok())?;
//! logger_init(&cfg)?;
//! # Ok::<(), procem_observe::LoggerError>(())
//! ```

mod logger;
pub use logger::*;
