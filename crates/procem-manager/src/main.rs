//! One-shot platform manager: launches the run described by
//! `SIMULATION_CONFIGURATION_FILE`, waits a grace period and exits.
//!
//! Exit code 0 when the run was launched and announced, 1 otherwise.

use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use tracing::{error, info, warn};

use procem_bus::{ManagementBus, ManagementConfig};
use procem_core::{Launcher, MetricsHandle, PlatformConfig, RunCoordinator, vars};
use procem_docker::{DockerConfig, DockerEngine};
use procem_observe::{LoggerConfig, logger_init};
use procem_prometheus::PrometheusMetrics;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            // The logger may not be up yet.
            eprintln!("platform-manager: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    // 1) Logger
    let logger = LoggerConfig::from_lookup(|key| std::env::var(key).ok())?;
    logger_init(&logger)?;
    info!("logger initialized");

    // 2) Configuration
    let config = Arc::new(PlatformConfig::from_env().context("reading platform configuration")?);
    let run_definition = config.run_definition.clone().with_context(|| {
        format!("{} is not set", vars::SIMULATION_CONFIGURATION_FILE)
    })?;
    info!(
        engine = %config.engine.host,
        slot_prefix = config.launcher.layout.prefix(),
        capacity = config.launcher.layout.capacity(),
        registry = config.registry.len(),
        "configuration loaded"
    );

    // 3) Engine + bus
    let engine = Arc::new(
        DockerEngine::new(DockerConfig::new(config.engine.host.clone()))
            .context("building container engine client")?,
    );
    let bus = Arc::new(
        ManagementBus::new(ManagementConfig::from(&config.bus))
            .context("building management bus client")?,
    );

    // 4) Metrics
    let prometheus = PrometheusMetrics::new().context("registering metrics")?;
    let metrics: MetricsHandle = Arc::new(prometheus.clone());

    // 5) Launcher + coordinator
    let launcher = Launcher::new(engine, config.launcher.layout.clone())
        .with_deadline(config.launcher.engine_timeout)
        .with_rollback(config.launcher.rollback)
        .with_metrics(metrics.clone());
    let coordinator =
        RunCoordinator::new(config.clone(), Arc::new(launcher), bus).with_metrics(metrics);

    // 6) Launch; the coordinator logs the outcome
    let launched = coordinator.launch_file(&run_definition).await.is_ok();

    // 7) Grace period, then shutdown
    tokio::time::sleep(config.launcher.shutdown_grace).await;
    if let Err(e) = coordinator.stop().await {
        warn!(error = %e, "shutdown did not complete cleanly");
    }

    // 8) Metrics dump
    if let Some(path) = &config.metrics_file {
        match prometheus.write_to(path) {
            Ok(()) => info!(path = %path.display(), "metrics written"),
            Err(e) => error!(path = %path.display(), error = %e, "failed to write metrics"),
        }
    }

    info!(launched, "platform manager exiting");
    Ok(launched)
}
