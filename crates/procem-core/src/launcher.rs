use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use procem_model::{RunSlot, SlotLayout, UnitRole, UnitSpec};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
    CoreError,
    engine::{ContainerEngine, CreateUnit, EngineError, UnitHandle},
    metrics::{MetricsHandle, noop_metrics},
    slot::SlotAllocator,
};

/// What happens to units created by a launch that fails part way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RollbackPolicy {
    /// Leave them; the error lists them for manual cleanup.
    #[default]
    Leave,
    /// Best-effort stop and remove of every unit the failing launch created.
    StopCreated,
}

/// Result of a successful [`Launcher::start_run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedRun {
    pub slot: RunSlot,
    /// Slot-prefixed names in start order; the manager is last.
    pub units: Vec<String>,
}

/// Creates and starts the units of a run on the container engine.
///
/// One lock covers slot allocation through the last start, and teardown, so
/// concurrent launches never observe the same free slot.
pub struct Launcher {
    engine: Arc<dyn ContainerEngine>,
    allocator: SlotAllocator,
    lock: Mutex<()>,
    deadline: Duration,
    rollback: RollbackPolicy,
    metrics: MetricsHandle,
}

struct Created {
    handle: UnitHandle,
    role: UnitRole,
}

impl Launcher {
    pub fn new(engine: Arc<dyn ContainerEngine>, layout: SlotLayout) -> Self {
        Self {
            engine,
            allocator: SlotAllocator::new(layout),
            lock: Mutex::new(()),
            deadline: Duration::from_secs(30),
            rollback: RollbackPolicy::Leave,
            metrics: noop_metrics(),
        }
    }

    /// Deadline of every single engine call.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_rollback(mut self, rollback: RollbackPolicy) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn layout(&self) -> &SlotLayout {
        self.allocator.layout()
    }

    /// Allocate a slot, then create, connect and start every unit.
    ///
    /// Units are launched log writer first and manager last; workers keep the caller's order.
    #[instrument(level = "info", skip_all, fields(units = specs.len()))]
    pub async fn start_run(&self, specs: &[UnitSpec]) -> Result<LaunchedRun, CoreError> {
        let mut ordered: Vec<&UnitSpec> = specs.iter().collect();
        ordered.sort_by_key(|spec| launch_rank(spec.role));
        check_names(&ordered)?;

        let _guard = self.lock.lock().await;

        let allocation = match tokio::time::timeout(
            self.deadline,
            self.allocator.allocate(&*self.engine),
        )
        .await
        {
            Ok(allocation) => allocation?,
            Err(_) => {
                return Err(CoreError::Engine {
                    operation: "list",
                    unit: "running units".to_string(),
                    source: self.deadline_error(),
                    left_running: Vec::new(),
                });
            }
        };
        self.metrics.record_slots_in_use(allocation.in_use);
        let slot = allocation.slot;
        let layout = self.allocator.layout();
        info!(slot = %layout.label(slot), "allocated run slot");

        let mut created: Vec<Created> = Vec::with_capacity(ordered.len());
        for spec in &ordered {
            let request = CreateUnit::from_spec(layout.unit_name(slot, &spec.name), spec);
            let handle = match self.call("create", &request.name, self.engine.create(&request)).await {
                Ok(handle) => handle,
                Err((operation, unit, source)) => {
                    let mut names = names_of(created);
                    if source.outcome_unknown() {
                        // the engine may hold the unit even though the call failed
                        names.push(request.name.clone());
                    }
                    return Err(self.fail(names, operation, unit, source).await);
                }
            };
            debug!(unit = %handle.name, id = %handle.id, "unit created");
            created.push(Created {
                handle,
                role: spec.role,
            });

            for network in spec.secondary_networks() {
                let name = request.name.as_str();
                if let Err((operation, unit, source)) = self
                    .call("attach network to", name, self.engine.attach_network(name, network))
                    .await
                {
                    return Err(self.fail(names_of(created), operation, unit, source).await);
                }
                debug!(unit = %name, network = %network, "network attached");
            }
        }

        let mut failed = None;
        for unit in &created {
            let handle = &unit.handle;
            if let Err(e) = self.call("start", &handle.name, self.engine.start(handle)).await {
                failed = Some(e);
                break;
            }
            debug!(unit = %handle.name, "unit started");
            self.metrics.record_unit_started(unit.role);
        }
        if let Some((operation, unit, source)) = failed {
            return Err(self.fail(names_of(created), operation, unit, source).await);
        }

        let units: Vec<String> = created.into_iter().map(|c| c.handle.name).collect();
        info!(slot = %layout.label(slot), units = units.len(), "run started");
        Ok(LaunchedRun { slot, units })
    }

    /// Stop and remove every running unit of one slot. Returns their names.
    #[instrument(level = "info", skip_all, fields(slot = %slot))]
    pub async fn stop_run(&self, slot: RunSlot) -> Result<Vec<String>, CoreError> {
        let _guard = self.lock.lock().await;
        let layout = self.allocator.layout();
        self.teardown(|name| layout.owns(slot, name)).await
    }

    /// Stop and remove every running unit that carries a slot prefix.
    #[instrument(level = "info", skip_all)]
    pub async fn stop_all(&self) -> Result<Vec<String>, CoreError> {
        let _guard = self.lock.lock().await;
        let layout = self.allocator.layout();
        self.teardown(|name| layout.parse(name).is_some()).await
    }

    /// Release the engine connection.
    pub async fn close(&self) -> Result<(), CoreError> {
        let _guard = self.lock.lock().await;
        self.call("close", self.engine.name(), self.engine.close())
            .await
            .map_err(|(operation, unit, source)| CoreError::Engine {
                operation,
                unit,
                source,
                left_running: Vec::new(),
            })
    }

    async fn teardown<F>(&self, selected: F) -> Result<Vec<String>, CoreError>
    where
        F: Fn(&str) -> bool,
    {
        let running = self
            .call("list", "running units", self.engine.list_running())
            .await
            .map_err(|(operation, unit, source)| CoreError::Engine {
                operation,
                unit,
                source,
                left_running: Vec::new(),
            })?;

        let targets: Vec<String> = running
            .into_iter()
            .map(|u| u.name)
            .filter(|name| selected(name))
            .collect();

        for (index, name) in targets.iter().enumerate() {
            let stopped = match self.call("stop", name, self.engine.stop(name)).await {
                Ok(()) => self.call("remove", name, self.engine.remove(name)).await,
                Err(e) => Err(e),
            };
            if let Err((operation, unit, source)) = stopped {
                return Err(CoreError::Engine {
                    operation,
                    unit,
                    source,
                    left_running: targets[index..].to_vec(),
                });
            }
            debug!(unit = %name, "unit stopped and removed");
        }

        info!(units = targets.len(), "units torn down");
        Ok(targets)
    }

    /// Run one engine call under the deadline.
    async fn call<T, Fut>(
        &self,
        operation: &'static str,
        unit: &str,
        fut: Fut,
    ) -> Result<T, (&'static str, String, EngineError)>
    where
        Fut: Future<Output = Result<T, EngineError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err((operation, unit.to_string(), e)),
            Err(_) => Err((operation, unit.to_string(), self.deadline_error())),
        }
    }

    fn deadline_error(&self) -> EngineError {
        EngineError::Deadline {
            timeout_ms: u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Apply the rollback policy to `names` and build the error for a failed launch.
    async fn fail(
        &self,
        names: Vec<String>,
        operation: &'static str,
        unit: String,
        source: EngineError,
    ) -> CoreError {
        let left_running = match self.rollback {
            RollbackPolicy::Leave => {
                if !names.is_empty() {
                    warn!(units = ?names, "launch failed; created units were left in place");
                }
                names
            }
            RollbackPolicy::StopCreated => self.roll_back(names).await,
        };
        CoreError::Engine {
            operation,
            unit,
            source,
            left_running,
        }
    }

    /// Stop and remove in reverse creation order; returns the units that could not be removed.
    async fn roll_back(&self, names: Vec<String>) -> Vec<String> {
        let mut remaining = Vec::new();
        for name in names.into_iter().rev() {
            if let Err((_, _, e)) = self.call("stop", &name, self.engine.stop(&name)).await {
                debug!(unit = %name, error = %e, "rollback could not stop unit");
            }
            match self.call("remove", &name, self.engine.remove(&name)).await {
                Ok(()) => debug!(unit = %name, "rolled back"),
                Err((_, _, e)) => {
                    warn!(unit = %name, error = %e, "rollback could not remove unit");
                    remaining.push(name);
                }
            }
        }
        remaining.reverse();
        remaining
    }
}

fn names_of(created: Vec<Created>) -> Vec<String> {
    created.into_iter().map(|c| c.handle.name).collect()
}

fn launch_rank(role: UnitRole) -> u8 {
    match role {
        UnitRole::LogWriter => 0,
        UnitRole::Worker => 1,
        UnitRole::Manager => 2,
    }
}

fn check_names(specs: &[&UnitSpec]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(CoreError::configuration(format!(
                "unit name {} appears twice in one run",
                spec.name
            )));
        }
    }
    Ok(())
}
