//! Docker Engine adapter for the platform launcher.
//!
//! Talks to the engine's HTTP API directly; the daemon must listen on TCP
//! (`DOCKER_HOST=tcp://...` or `http://...`).

mod error;
pub use error::DockerError;

mod engine;
pub use engine::{API_VERSION, DockerConfig, DockerEngine};
