//! Unit specifications for one run: layered parameters, networks, volumes and
//! instance expansion.
mod attributes;
mod layers;
mod naming;

pub use attributes::{resolve_attributes, static_attributes};
pub use layers::{Layer, LayeredEnv};
pub use naming::{component_log_filename, endpoint_name, expand_instance};

use std::{collections::HashSet, sync::Arc};

use procem_model::{
    DeploymentClass, RunDefinition, UnitEnv, UnitRole, UnitSpec, VolumeBinding, WorkerType,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{CoreError, config::PlatformConfig, vars};

/// Identifier of one run and the names derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    /// Millisecond UTC timestamp taken when the launch began.
    pub simulation_id: String,
    /// Run-specific bus exchange.
    pub endpoint: String,
}

/// Everything needed to launch and announce one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub identity: RunIdentity,
    /// Log writer first, workers in definition order, manager last.
    pub units: Vec<UnitSpec>,
    /// Unprefixed worker unit names.
    pub workers: Vec<String>,
    /// Static type name to instance name to attributes.
    pub static_components: Map<String, Value>,
}

/// Builds unit specifications from the platform configuration and a run definition.
#[derive(Debug, Clone)]
pub struct ConfigComposer {
    config: Arc<PlatformConfig>,
}

impl ConfigComposer {
    pub fn new(config: Arc<PlatformConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn identity(&self, simulation_id: impl Into<String>) -> RunIdentity {
        let simulation_id = simulation_id.into();
        RunIdentity {
            endpoint: endpoint_name(&self.config.bus.exchange_prefix, &simulation_id),
            simulation_id,
        }
    }

    pub fn log_file_for(&self, unit: &str) -> String {
        component_log_filename(&self.config.common.log_file, unit)
    }

    /// Validate the definition against the registry and build every unit.
    ///
    /// Fails before anything is launched on an unknown or core type, bad attributes,
    /// or duplicate unit names.
    pub fn plan(&self, identity: RunIdentity, def: &RunDefinition) -> Result<RunPlan, CoreError> {
        def.validate()?;

        let manager_name = self.manager_name(def);
        let log_writer_name = self.config.store.appname.clone();
        let mut names: HashSet<String> = HashSet::from([manager_name.clone(), log_writer_name]);
        if names.len() != 2 {
            return Err(CoreError::configuration(format!(
                "manager and log writer share the unit name {manager_name:?}"
            )));
        }

        let mut workers = Vec::new();
        let mut worker_specs = Vec::new();
        let mut static_components = Map::new();

        for (type_name, instances) in def.components.iter() {
            let worker = self.config.registry.get(type_name).ok_or_else(|| {
                CoreError::configuration(format!("unknown component type {type_name}"))
            })?;

            match worker.class {
                DeploymentClass::Core => {
                    return Err(CoreError::configuration(format!(
                        "component type {type_name} is part of the platform and cannot be launched"
                    )));
                }
                DeploymentClass::Static => {
                    let mut block = Map::new();
                    for (instance, config) in instances.iter() {
                        let attrs = static_attributes(worker, instance, config)?;
                        block.insert(instance.to_string(), Value::Object(attrs));
                    }
                    static_components.insert(type_name.to_string(), Value::Object(block));
                }
                DeploymentClass::Dynamic => {
                    for (instance, config) in instances.iter() {
                        let overrides = resolve_attributes(worker, instance, config)?;
                        for unit in expand_instance(instance, config.duplication_count) {
                            if !names.insert(unit.clone()) {
                                return Err(CoreError::configuration(format!(
                                    "unit name {unit} is used twice in the run"
                                )));
                            }
                            worker_specs.push(self.worker_unit(
                                &identity,
                                worker,
                                &unit,
                                overrides.clone(),
                            )?);
                            workers.push(unit);
                        }
                    }
                }
            }
        }

        let mut units = Vec::with_capacity(worker_specs.len() + 2);
        units.push(self.log_writer_unit(&identity, def));
        units.extend(worker_specs);
        units.push(self.manager_unit(&identity, def, &workers)?);

        debug!(
            simulation_id = %identity.simulation_id,
            units = units.len(),
            static_types = static_components.len(),
            "run plan composed"
        );
        Ok(RunPlan {
            identity,
            units,
            workers,
            static_components,
        })
    }

    /// One worker unit; `overrides` are the instance's resolved attributes.
    pub fn worker_unit(
        &self,
        run: &RunIdentity,
        worker: &WorkerType,
        unit: &str,
        overrides: UnitEnv,
    ) -> Result<UnitSpec, CoreError> {
        let image = worker.image.clone().ok_or_else(|| {
            CoreError::configuration(format!("component type {} has no image", worker.name))
        })?;

        let mut env = LayeredEnv::new();
        if worker.include_common_parameters {
            env.extend(Layer::Common, self.common_layer(run));
            env.set(Layer::Role, vars::SIMULATION_COMPONENT_NAME, unit);
            env.set(Layer::Role, vars::SIMULATION_LOG_FILE, self.log_file_for(unit));
        }
        if worker.include_bus_parameters {
            env.extend(Layer::Connection, self.bus_layer(run));
        }
        if worker.include_store_parameters {
            env.extend(Layer::Connection, self.store_layer());
        }
        for entry in overrides.iter() {
            if let Some(layer) = env.source_of(entry.key()) {
                debug!(
                    unit,
                    key = entry.key(),
                    shadowed = ?layer,
                    "instance attribute overrides a platform parameter"
                );
            }
        }
        env.extend(Layer::Instance, overrides);

        Ok(UnitSpec::new(unit, UnitRole::Worker, image)
            .with_env(env.resolve())
            .with_networks(self.networks(
                worker.include_bus_parameters,
                worker.include_store_parameters,
            ))
            .with_volumes(self.volumes(UnitRole::Worker)))
    }

    pub fn manager_unit(
        &self,
        run: &RunIdentity,
        def: &RunDefinition,
        workers: &[String],
    ) -> Result<UnitSpec, CoreError> {
        let settings = &self.config.manager;
        let sim = &def.simulation;
        let name = self.manager_name(def);

        let mut env = LayeredEnv::new();
        env.extend(Layer::Common, self.common_layer(run));
        env.extend(Layer::Connection, self.bus_layer(run));

        env.set(Layer::Role, vars::SIMULATION_MANAGER_NAME, settings.name.as_str());
        env.set(
            Layer::Role,
            vars::SIMULATION_EPOCH_TIMER_INTERVAL,
            seconds(settings.epoch_timer_interval),
        );
        env.set(
            Layer::Role,
            vars::SIMULATION_MAX_EPOCH_RESENDS,
            settings.max_epoch_resends.to_string(),
        );
        env.set(Layer::Role, vars::SIMULATION_LOG_FILE, self.log_file_for(&name));
        env.set(Layer::Role, vars::SIMULATION_NAME, sim.name.as_str());
        env.set(Layer::Role, vars::SIMULATION_DESCRIPTION, sim.description.as_str());
        env.set(Layer::Role, vars::SIMULATION_COMPONENTS, workers.join(","));
        env.set(
            Layer::Role,
            vars::SIMULATION_INITIAL_START_TIME,
            def.normalized_start_time()?,
        );
        env.set(Layer::Role, vars::SIMULATION_EPOCH_LENGTH, sim.epoch_length.to_string());
        env.set(Layer::Role, vars::SIMULATION_MAX_EPOCHS, sim.max_epoch_count.to_string());

        if let Some(manager_name) = &sim.manager_name {
            env.set(Layer::Instance, vars::SIMULATION_MANAGER_NAME, manager_name.as_str());
        }
        if let Some(interval) = sim.epoch_timer_interval {
            env.set(Layer::Instance, vars::SIMULATION_EPOCH_TIMER_INTERVAL, seconds(interval));
        }
        if let Some(resends) = sim.max_epoch_resend_count {
            env.set(Layer::Instance, vars::SIMULATION_MAX_EPOCH_RESENDS, resends.to_string());
        }

        Ok(UnitSpec::new(name, UnitRole::Manager, settings.image.clone())
            .with_env(env.resolve())
            .with_networks(self.networks(true, false))
            .with_volumes(self.volumes(UnitRole::Manager)))
    }

    pub fn log_writer_unit(&self, run: &RunIdentity, def: &RunDefinition) -> UnitSpec {
        let settings = &self.config.log_writer;
        let sim = &def.simulation;
        let name = self.config.store.appname.as_str();

        let mut env = LayeredEnv::new();
        env.extend(Layer::Common, self.common_layer(run));
        env.extend(Layer::Connection, self.bus_layer(run));
        env.extend(Layer::Connection, self.store_layer());

        env.set(
            Layer::Role,
            vars::MESSAGE_BUFFER_MAX_DOCUMENTS,
            settings.max_documents.to_string(),
        );
        env.set(Layer::Role, vars::MESSAGE_BUFFER_MAX_INTERVAL, seconds(settings.max_interval));
        env.set(Layer::Role, vars::SIMULATION_LOG_FILE, self.log_file_for(name));

        if let Some(count) = sim.message_buffer_max_document_count {
            env.set(Layer::Instance, vars::MESSAGE_BUFFER_MAX_DOCUMENTS, count.to_string());
        }
        if let Some(interval) = sim.message_buffer_max_interval {
            env.set(Layer::Instance, vars::MESSAGE_BUFFER_MAX_INTERVAL, seconds(interval));
        }

        UnitSpec::new(name, UnitRole::LogWriter, settings.image.clone())
            .with_env(env.resolve())
            .with_networks(self.networks(true, true))
            .with_volumes(self.volumes(UnitRole::LogWriter))
    }

    fn manager_name(&self, def: &RunDefinition) -> String {
        def.simulation
            .manager_name
            .clone()
            .unwrap_or_else(|| self.config.manager.name.clone())
    }

    fn common_layer(&self, run: &RunIdentity) -> UnitEnv {
        let common = &self.config.common;
        let mut env = UnitEnv::new()
            .with(vars::SIMULATION_LOG_LEVEL, common.log_level.to_string())
            .with(vars::SIMULATION_LOG_FILE, common.log_file.as_str());
        if let Some(format) = &common.log_format {
            env.push(vars::SIMULATION_LOG_FORMAT, format.as_str());
        }
        env.with(vars::SIMULATION_STATE_MESSAGE_TOPIC, common.state_topic.as_str())
            .with(vars::SIMULATION_EPOCH_MESSAGE_TOPIC, common.epoch_topic.as_str())
            .with(vars::SIMULATION_STATUS_MESSAGE_TOPIC, common.status_topic.as_str())
            .with(vars::SIMULATION_ERROR_MESSAGE_TOPIC, common.error_topic.as_str())
            .with(vars::SIMULATION_ID, run.simulation_id.as_str())
    }

    fn bus_layer(&self, run: &RunIdentity) -> UnitEnv {
        let bus = &self.config.bus;
        UnitEnv::new()
            .with(vars::RABBITMQ_HOST, bus.host.as_str())
            .with(vars::RABBITMQ_PORT, bus.port.to_string())
            .with(vars::RABBITMQ_LOGIN, bus.login.as_str())
            .with(vars::RABBITMQ_PASSWORD, bus.password.as_str())
            .with(vars::RABBITMQ_SSL, bus.ssl.to_string())
            .with(vars::RABBITMQ_SSL_VERSION, bus.ssl_version.as_str())
            .with(vars::RABBITMQ_EXCHANGE, run.endpoint.as_str())
            .with(vars::RABBITMQ_EXCHANGE_AUTODELETE, "true")
            .with(vars::RABBITMQ_EXCHANGE_DURABLE, "false")
    }

    fn store_layer(&self) -> UnitEnv {
        let store = &self.config.store;
        UnitEnv::new()
            .with(vars::MONGODB_HOST, store.host.as_str())
            .with(vars::MONGODB_PORT, store.port.to_string())
            .with(vars::MONGODB_USERNAME, store.username.as_str())
            .with(vars::MONGODB_PASSWORD, store.password.as_str())
            .with(vars::MONGODB_DATABASE, store.database.as_str())
            .with(vars::MONGODB_ADMIN, store.admin.to_string())
            .with(vars::MONGODB_APPNAME, store.appname.as_str())
            .with(vars::MONGODB_METADATA_COLLECTION, store.metadata_collection.as_str())
            .with(
                vars::MONGODB_MESSAGES_COLLECTION_PREFIX,
                store.messages_collection_prefix.as_str(),
            )
    }

    /// Platform network first, then bus and store networks as requested.
    fn networks(&self, bus: bool, store: bool) -> Vec<String> {
        let engine = &self.config.engine;
        let mut networks = vec![engine.platform_network.clone()];
        if bus && let Some(net) = &engine.bus_network {
            networks.push(net.clone());
        }
        if store && let Some(net) = &engine.store_network {
            networks.push(net.clone());
        }
        networks
    }

    fn volumes(&self, role: UnitRole) -> Vec<VolumeBinding> {
        let engine = &self.config.engine;
        let resources = match role {
            UnitRole::Worker => engine.resources_volume.as_ref(),
            UnitRole::Manager | UnitRole::LogWriter => None,
        };
        resources
            .into_iter()
            .chain(engine.logs_volume.as_ref())
            .cloned()
            .collect()
    }
}

/// Seconds as a decimal string; whole values keep one decimal (`30.0`).
fn seconds(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
