use std::{fs, io, path::Path, time::Duration};

use procem_core::{LaunchOutcome, MetricsBackend};
use procem_model::UnitRole;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};
use thiserror::Error;

const LAUNCH_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("exposition is not UTF-8")]
    Encoding,
    #[error("failed to write metrics: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    launches: IntCounterVec,
    launch_duration: HistogramVec,
    units_started: IntCounterVec,
    slots_in_use: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let launches = IntCounterVec::new(
            Opts::new("procem_launches_total", "Launch attempts by outcome"),
            &["outcome"],
        )?;
        let launch_duration = HistogramVec::new(
            HistogramOpts::new(
                "procem_launch_duration_seconds",
                "Wall time of a launch attempt, from validation to announcement",
            )
            .buckets(LAUNCH_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        let units_started = IntCounterVec::new(
            Opts::new("procem_units_started_total", "Units started by role"),
            &["role"],
        )?;
        let slots_in_use = IntGauge::new(
            "procem_slots_in_use",
            "Run slots observed in use at the last allocation",
        )?;

        registry.register(Box::new(launches.clone()))?;
        registry.register(Box::new(launch_duration.clone()))?;
        registry.register(Box::new(units_started.clone()))?;
        registry.register(Box::new(slots_in_use.clone()))?;

        Ok(Self {
            registry,
            launches,
            launch_duration,
            units_started,
            slots_in_use,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|_| MetricsError::Encoding)
    }

    /// Overwrites `path` with the text exposition (node-exporter textfile style).
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        fs::write(path, self.encode_text()?)?;
        Ok(())
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_launch(&self, outcome: LaunchOutcome, duration: Duration) {
        self.launches.with_label_values(&[outcome.as_str()]).inc();
        self.launch_duration
            .with_label_values(&[outcome.as_str()])
            .observe(duration.as_secs_f64());
    }

    fn record_unit_started(&self, role: UnitRole) {
        self.units_started.with_label_values(&[role.as_str()]).inc();
    }

    fn record_slots_in_use(&self, count: usize) {
        self.slots_in_use
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_launches_and_units() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_launch(LaunchOutcome::Success, Duration::from_millis(1500));
        metrics.record_launch(LaunchOutcome::Success, Duration::from_millis(700));
        metrics.record_launch(LaunchOutcome::CapacityExhausted, Duration::from_millis(10));
        metrics.record_unit_started(UnitRole::LogWriter);
        metrics.record_unit_started(UnitRole::Worker);
        metrics.record_unit_started(UnitRole::Worker);
        metrics.record_slots_in_use(3);

        assert_eq!(metrics.launches.with_label_values(&["success"]).get(), 2);
        assert_eq!(
            metrics
                .launches
                .with_label_values(&["capacity_exhausted"])
                .get(),
            1
        );
        assert_eq!(metrics.units_started.with_label_values(&["worker"]).get(), 2);
        assert_eq!(
            metrics
                .launch_duration
                .with_label_values(&["success"])
                .get_sample_count(),
            2
        );
        assert_eq!(metrics.slots_in_use.get(), 3);
    }

    #[test]
    fn instances_do_not_share_state() {
        let a = PrometheusMetrics::new().unwrap();
        let b = PrometheusMetrics::new().unwrap();
        a.record_unit_started(UnitRole::Manager);
        assert_eq!(a.units_started.with_label_values(&["manager"]).get(), 1);
        assert_eq!(b.units_started.with_label_values(&["manager"]).get(), 0);
    }

    #[test]
    fn text_exposition_names_every_metric() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_launch(LaunchOutcome::EngineFailure, Duration::from_secs(2));
        metrics.record_unit_started(UnitRole::Manager);
        metrics.record_slots_in_use(1);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains(r#"procem_launches_total{outcome="engine_failure"} 1"#));
        assert!(text.contains(r#"procem_units_started_total{role="manager"} 1"#));
        assert!(text.contains("procem_launch_duration_seconds_bucket"));
        assert!(text.contains("procem_slots_in_use 1"));
    }

    #[test]
    fn writes_exposition_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procem.prom");
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_slots_in_use(2);
        metrics.write_to(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("procem_slots_in_use 2"));
    }
}
