use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use procem_model::{RunDefinition, RunSlot, timestamp::utc_now_millis};
use tracing::{error, info, instrument, warn};

use crate::{
    CoreError,
    announce::{START_TOPIC, StartMessage},
    bus::{MessageBus, PublishError},
    compose::ConfigComposer,
    config::PlatformConfig,
    launcher::Launcher,
    metrics::{LaunchOutcome, MetricsHandle, noop_metrics},
};

/// Outcome of a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub slot: RunSlot,
    /// Zero-padded slot, e.g. `"07"`.
    pub slot_label: String,
    pub simulation_id: String,
    /// Run-specific bus exchange.
    pub endpoint: String,
    /// Slot-prefixed unit names; the manager is last.
    pub units: Vec<String>,
}

/// Validates, composes, launches and announces runs.
///
/// The only layer that logs user-facing launch errors.
pub struct RunCoordinator {
    composer: ConfigComposer,
    launcher: Arc<Launcher>,
    bus: Arc<dyn MessageBus>,
    metrics: MetricsHandle,
    stopped: AtomicBool,
}

impl RunCoordinator {
    pub fn new(config: Arc<PlatformConfig>, launcher: Arc<Launcher>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            composer: ConfigComposer::new(config),
            launcher,
            bus,
            metrics: noop_metrics(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Load a run definition file and launch it.
    pub async fn launch_file(&self, path: impl AsRef<Path>) -> Result<LaunchReport, CoreError> {
        let path = path.as_ref();
        let def = match RunDefinition::load(path) {
            Ok(def) => def,
            Err(e) => {
                let err = CoreError::from(e);
                error!(path = %path.display(), error = %err, "cannot load run definition");
                self.metrics.record_launch(LaunchOutcome::Configuration, Duration::ZERO);
                return Err(err);
            }
        };
        self.launch(&def).await
    }

    /// Launch one run and announce it on the management exchange.
    #[instrument(level = "info", skip_all, fields(run = %def.simulation.name))]
    pub async fn launch(&self, def: &RunDefinition) -> Result<LaunchReport, CoreError> {
        let started = Instant::now();
        let result = self.try_launch(def).await;
        self.metrics.record_launch(LaunchOutcome::of(&result), started.elapsed());

        match &result {
            Ok(report) => {
                info!(
                    simulation_id = %report.simulation_id,
                    slot = %report.slot_label,
                    "run '{}' started",
                    def.simulation.name
                );
                info!(
                    "follow the run with: source follow_simulation.sh {}",
                    report.slot_label
                );
            }
            Err(e) => {
                let left = e.left_running();
                if left.is_empty() {
                    error!(error = %e, "run '{}' not started", def.simulation.name);
                } else {
                    error!(error = %e, units = ?left, "run '{}' failed; units left running", def.simulation.name);
                }
            }
        }
        result
    }

    async fn try_launch(&self, def: &RunDefinition) -> Result<LaunchReport, CoreError> {
        if self.is_stopped() {
            return Err(CoreError::Stopped);
        }

        let identity = self.composer.identity(utc_now_millis());
        let plan = self.composer.plan(identity, def)?;
        info!(
            simulation_id = %plan.identity.simulation_id,
            units = plan.units.len(),
            "starting units"
        );

        let launched = self.launcher.start_run(&plan.units).await?;
        let slot_label = self.launcher.layout().label(launched.slot);

        let message = StartMessage::new(utc_now_millis(), &plan, def);
        let announced = match message.to_bytes() {
            Ok(payload) => self.bus.publish(START_TOPIC, payload).await,
            Err(e) => Err(PublishError::Rejected(e.to_string())),
        };
        if let Err(source) = announced {
            return Err(CoreError::Announce {
                slot: launched.slot,
                simulation_id: plan.identity.simulation_id,
                units: launched.units,
                source,
            });
        }
        info!(exchange = %plan.identity.endpoint, "start message sent");

        Ok(LaunchReport {
            slot: launched.slot,
            slot_label,
            simulation_id: plan.identity.simulation_id,
            endpoint: plan.identity.endpoint,
            units: launched.units,
        })
    }

    /// Stop and remove the units of one run.
    pub async fn stop_run(&self, slot: RunSlot) -> Result<Vec<String>, CoreError> {
        self.launcher.stop_run(slot).await
    }

    /// Close the bus and engine connections. Later calls do nothing.
    pub async fn stop(&self) -> Result<(), CoreError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("stopping the platform manager");

        if let Err(e) = self.bus.close().await {
            warn!(error = %e, "closing the message bus failed");
        }
        self.launcher.close().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use procem_model::{GeneralConfig, InstanceConfig, SlotLayout, UnitRole};

    use super::*;
    use crate::{
        config::tests::{base_env, config_from},
        engine::EngineError,
        metrics::MetricsBackend,
        testing::{FakeBus, FakeEngine},
        vars,
    };

    fn general() -> GeneralConfig {
        GeneralConfig {
            name: "demo".into(),
            description: "end to end".into(),
            initial_start_time: "2020-06-25T00:00:00.000Z".into(),
            epoch_length: 60,
            max_epoch_count: 10,
            manager_name: None,
            epoch_timer_interval: None,
            max_epoch_resend_count: None,
            message_buffer_max_document_count: None,
            message_buffer_max_interval: None,
        }
    }

    fn two_loads() -> RunDefinition {
        RunDefinition::new(general()).with_instance(
            "Load",
            "Load",
            InstanceConfig::default().with_duplication(2),
        )
    }

    struct Harness {
        engine: Arc<FakeEngine>,
        bus: Arc<FakeBus>,
        coordinator: RunCoordinator,
    }

    fn harness_with(bus: FakeBus) -> Harness {
        let config = Arc::new(config_from(&base_env()).unwrap());
        let engine = Arc::new(FakeEngine::new());
        let bus = Arc::new(bus);
        let launcher = Arc::new(Launcher::new(engine.clone(), SlotLayout::default()));
        let coordinator = RunCoordinator::new(config, launcher, bus.clone());
        Harness {
            engine,
            bus,
            coordinator,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeBus::new())
    }

    #[tokio::test]
    async fn end_to_end_launch() {
        let h = harness();
        let report = h.coordinator.launch(&two_loads()).await.unwrap();

        assert_eq!(report.slot, RunSlot(0));
        assert_eq!(report.slot_label, "00");
        assert_eq!(
            report.units,
            [
                "Sim00_log_writer",
                "Sim00_Load_1",
                "Sim00_Load_2",
                "Sim00_SimulationManager"
            ]
        );

        let requests = h.engine.requests();
        assert_eq!(requests.len(), 4);
        let id_entry = format!("{}={}", vars::SIMULATION_ID, report.simulation_id);
        assert!(requests.iter().all(|r| r.env.contains(&id_entry)));

        let published = h.bus.published();
        assert_eq!(published.len(), 1);
        let (topic, message) = &published[0];
        assert_eq!(topic, "Start");
        assert_eq!(message["SimulationId"], report.simulation_id.as_str());
        assert_eq!(message["SimulationSpecificExchange"], report.endpoint.as_str());
        assert_eq!(message["SimulationName"], "demo");
    }

    #[tokio::test]
    async fn unknown_type_touches_nothing() {
        let h = harness();
        let def = two_loads().with_instance("Battery", "B1", InstanceConfig::default());

        assert!(matches!(
            h.coordinator.launch(&def).await,
            Err(CoreError::Configuration(_))
        ));
        assert!(h.engine.calls().is_empty());
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn static_components_go_into_the_announcement() {
        let h = harness();
        let def = two_loads().with_instance(
            "Grid",
            "MainGrid",
            InstanceConfig::default().with_attribute("Voltage", serde_json::json!(230)),
        );
        let report = h.coordinator.launch(&def).await.unwrap();
        assert_eq!(report.units.len(), 4);

        let published = h.bus.published();
        assert_eq!(published[0].1["Grid"]["MainGrid"]["Voltage"], 230);
    }

    #[tokio::test]
    async fn failed_announcement_keeps_units_running() {
        let h = harness_with(FakeBus::failing());
        let err = h.coordinator.launch(&two_loads()).await.unwrap_err();

        match err {
            CoreError::Announce { slot, units, .. } => {
                assert_eq!(slot, RunSlot(0));
                assert_eq!(units.len(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.engine.running().len(), 4);
    }

    #[tokio::test]
    async fn engine_failure_is_not_announced() {
        let h = harness();
        h.engine.fail_start_of("Load_2");
        let err = h.coordinator.launch(&two_loads()).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Engine {
                source: EngineError::Rejected(_),
                ..
            }
        ));
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn concurrent_launches_use_slots_zero_and_one() {
        let h = harness();
        let def = two_loads();
        let (a, b) = tokio::join!(h.coordinator.launch(&def), h.coordinator.launch(&def));

        let mut slots = vec![a.unwrap().slot, b.unwrap().slot];
        slots.sort();
        assert_eq!(slots, [RunSlot(0), RunSlot(1)]);
        assert_eq!(h.bus.published().len(), 2);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_blocks_launches() {
        let h = harness();
        h.coordinator.stop().await.unwrap();
        h.coordinator.stop().await.unwrap();

        assert!(h.coordinator.is_stopped());
        assert_eq!(h.bus.close_count(), 1);
        assert!(h.engine.is_closed());
        assert!(matches!(
            h.coordinator.launch(&two_loads()).await,
            Err(CoreError::Stopped)
        ));
    }

    #[tokio::test]
    async fn launch_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yml");
        std::fs::write(
            &path,
            "Simulation:\n  Name: from-file\n  InitialStartTime: 2020-06-25T00:00:00Z\n  EpochLength: 60\n  MaxEpochCount: 10\nComponents:\n  Load:\n    Load:\n      duplication_count: 3\n",
        )
        .unwrap();

        let h = harness();
        let report = h.coordinator.launch_file(&path).await.unwrap();
        assert_eq!(report.units.len(), 5);
        let manager = h.engine.requests().pop().unwrap();
        assert_eq!(manager.name, "Sim00_SimulationManager");
        assert!(manager.env.contains(&"SIMULATION_COMPONENTS=Load_1,Load_2,Load_3".to_string()));

        assert!(matches!(
            h.coordinator.launch_file(dir.path().join("missing.yml")).await,
            Err(CoreError::Configuration(_))
        ));
    }

    #[derive(Default)]
    struct Recorder {
        outcomes: Mutex<Vec<LaunchOutcome>>,
        started: Mutex<Vec<UnitRole>>,
    }

    impl MetricsBackend for Recorder {
        fn record_launch(&self, outcome: LaunchOutcome, _duration: Duration) {
            self.outcomes.lock().unwrap().push(outcome);
        }

        fn record_unit_started(&self, role: UnitRole) {
            self.started.lock().unwrap().push(role);
        }

        fn record_slots_in_use(&self, _count: usize) {}
    }

    #[tokio::test]
    async fn launches_are_measured() {
        let config = Arc::new(config_from(&base_env()).unwrap());
        let engine = Arc::new(FakeEngine::new());
        let recorder = Arc::new(Recorder::default());
        let launcher = Arc::new(
            Launcher::new(engine, SlotLayout::default()).with_metrics(recorder.clone()),
        );
        let coordinator = RunCoordinator::new(config, launcher, Arc::new(FakeBus::new()))
            .with_metrics(recorder.clone());

        coordinator.launch(&two_loads()).await.unwrap();
        let bad = two_loads().with_instance("Battery", "B1", InstanceConfig::default());
        coordinator.launch(&bad).await.unwrap_err();

        assert_eq!(
            *recorder.outcomes.lock().unwrap(),
            [LaunchOutcome::Success, LaunchOutcome::Configuration]
        );
        assert_eq!(
            *recorder.started.lock().unwrap(),
            [
                UnitRole::LogWriter,
                UnitRole::Worker,
                UnitRole::Worker,
                UnitRole::Manager
            ]
        );
    }
}
