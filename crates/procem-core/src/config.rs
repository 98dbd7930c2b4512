//! Platform configuration, read once from the process environment at startup.
use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use procem_model::{ImageRef, SlotLayout, VolumeBinding, WorkerRegistry};
use tracing::{debug, warn};

use crate::{CoreError, launcher::RollbackPolicy, vars};

/// Message bus connection and exchange naming.
#[derive(Debug, Clone, PartialEq)]
pub struct BusSettings {
    /// Broker host (default: `localhost`).
    pub host: String,
    /// AMQP port (default: 5672).
    pub port: u16,
    pub login: String,
    pub password: String,
    /// Whether units connect with TLS (default: false).
    pub ssl: bool,
    /// TLS protocol name forwarded to units (default: `PROTOCOL_TLS`).
    pub ssl_version: String,
    /// Shared management exchange the run-start announcement goes to.
    pub management_exchange: String,
    /// Declared durability of the management exchange (default: false).
    pub management_exchange_durable: bool,
    /// Declared auto-delete flag of the management exchange (default: false).
    pub management_exchange_auto_delete: bool,
    /// Prefix of every run-specific exchange (default: `procem.`).
    pub exchange_prefix: String,
    /// HTTP management API base URL (default: `http://<host>:15672`).
    pub management_url: String,
    /// Virtual host (default: `/`).
    pub vhost: String,
}

/// Backing store connection, forwarded to units that ask for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub admin: bool,
    /// Application name; also the log writer's unit name (default: `log_writer`).
    pub appname: String,
    pub metadata_collection: String,
    pub messages_collection_prefix: String,
}

/// Logging and topic names shared by every unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonSettings {
    /// Numeric log level forwarded to units (default: 20).
    pub log_level: u32,
    /// Base log file name; each unit gets `<stem>_<unit>.<ext>`.
    pub log_file: String,
    pub log_format: Option<String>,
    pub state_topic: String,
    pub epoch_topic: String,
    pub status_topic: String,
    pub error_topic: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    pub image: ImageRef,
    /// Default manager unit name (default: `SimulationManager`).
    pub name: String,
    /// Seconds (default: 30.0).
    pub epoch_timer_interval: f64,
    pub max_epoch_resends: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogWriterSettings {
    pub image: ImageRef,
    pub max_documents: u32,
    /// Seconds (default: 5.0).
    pub max_interval: f64,
}

/// Container engine endpoint, networks and shared volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Engine HTTP endpoint (default: `http://localhost:2375`).
    pub host: String,
    /// Network every unit is created on.
    pub platform_network: String,
    pub bus_network: Option<String>,
    pub store_network: Option<String>,
    pub resources_volume: Option<VolumeBinding>,
    pub logs_volume: Option<VolumeBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LauncherSettings {
    pub layout: SlotLayout,
    /// Deadline of every single engine call (default: 30 s).
    pub engine_timeout: Duration,
    pub rollback: RollbackPolicy,
    /// Wait between a launch and shutdown of the one-shot binary (default: 5 s).
    pub shutdown_grace: Duration,
}

/// Immutable platform configuration passed to the composer and coordinator.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub bus: BusSettings,
    pub store: StoreSettings,
    pub common: CommonSettings,
    pub manager: ManagerSettings,
    pub log_writer: LogWriterSettings,
    pub engine: EngineSettings,
    pub launcher: LauncherSettings,
    pub registry: WorkerRegistry,
    pub metrics_file: Option<PathBuf>,
    /// Run definition file of the one-shot binary.
    pub run_definition: Option<PathBuf>,
}

impl PlatformConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let bus_host = env.string(vars::RABBITMQ_HOST, "localhost");
        let bus = BusSettings {
            port: env.parse(vars::RABBITMQ_PORT, 5672)?,
            login: env.string(vars::RABBITMQ_LOGIN, "guest"),
            password: env.string(vars::RABBITMQ_PASSWORD, "guest"),
            ssl: env.flag(vars::RABBITMQ_SSL, false)?,
            ssl_version: env.string(vars::RABBITMQ_SSL_VERSION, "PROTOCOL_TLS"),
            management_exchange: env.string(vars::RABBITMQ_EXCHANGE, "procem.management"),
            management_exchange_durable: env.flag(vars::RABBITMQ_EXCHANGE_DURABLE, false)?,
            management_exchange_auto_delete: env.flag(vars::RABBITMQ_EXCHANGE_AUTODELETE, false)?,
            exchange_prefix: env.string(vars::RABBITMQ_EXCHANGE_PREFIX, "procem."),
            management_url: env
                .optional(vars::RABBITMQ_MANAGEMENT_URL)
                .unwrap_or_else(|| format!("http://{bus_host}:15672")),
            vhost: env.string(vars::RABBITMQ_VHOST, "/"),
            host: bus_host,
        };

        let store = StoreSettings {
            host: env.string(vars::MONGODB_HOST, "localhost"),
            port: env.parse(vars::MONGODB_PORT, 27017)?,
            username: env.string(vars::MONGODB_USERNAME, ""),
            password: env.string(vars::MONGODB_PASSWORD, ""),
            database: env.string(vars::MONGODB_DATABASE, "simulations"),
            admin: env.flag(vars::MONGODB_ADMIN, true)?,
            appname: env.string(vars::MONGODB_APPNAME, "log_writer"),
            metadata_collection: env.string(vars::MONGODB_METADATA_COLLECTION, "simulations"),
            messages_collection_prefix: env
                .string(vars::MONGODB_MESSAGES_COLLECTION_PREFIX, "simulation_"),
        };
        if !procem_model::run::is_unit_name(&store.appname) {
            return Err(CoreError::configuration(format!(
                "{} {:?} is not a valid unit name",
                vars::MONGODB_APPNAME,
                store.appname
            )));
        }

        let common = CommonSettings {
            log_level: env.parse(vars::SIMULATION_LOG_LEVEL, 20)?,
            log_file: env.string(vars::SIMULATION_LOG_FILE, "logfile.out"),
            log_format: env.optional(vars::SIMULATION_LOG_FORMAT),
            state_topic: env.string(vars::SIMULATION_STATE_MESSAGE_TOPIC, "SimState"),
            epoch_topic: env.string(vars::SIMULATION_EPOCH_MESSAGE_TOPIC, "Epoch"),
            status_topic: env.string(vars::SIMULATION_STATUS_MESSAGE_TOPIC, "Status"),
            error_topic: env.string(vars::SIMULATION_ERROR_MESSAGE_TOPIC, "Error"),
        };

        let manager = ManagerSettings {
            image: env.image(vars::SIMULATION_MANAGER_IMAGE)?,
            name: env.string(vars::SIMULATION_MANAGER_NAME, "SimulationManager"),
            epoch_timer_interval: env.parse(vars::SIMULATION_EPOCH_TIMER_INTERVAL, 30.0)?,
            max_epoch_resends: env.parse(vars::SIMULATION_MAX_EPOCH_RESENDS, 5)?,
        };
        if !procem_model::run::is_unit_name(&manager.name) {
            return Err(CoreError::configuration(format!(
                "{} {:?} is not a valid unit name",
                vars::SIMULATION_MANAGER_NAME,
                manager.name
            )));
        }

        let log_writer = LogWriterSettings {
            image: env.image(vars::SIMULATION_LOGWRITER_IMAGE)?,
            max_documents: env.parse(vars::MESSAGE_BUFFER_MAX_DOCUMENTS, 10)?,
            max_interval: env.parse(vars::MESSAGE_BUFFER_MAX_INTERVAL, 5.0)?,
        };

        let engine = EngineSettings {
            host: docker_url(&env.string(vars::DOCKER_HOST, "http://localhost:2375")),
            platform_network: env.required(vars::DOCKER_NETWORK_PLATFORM)?,
            bus_network: env.optional(vars::DOCKER_NETWORK_RABBITMQ),
            store_network: env.optional(vars::DOCKER_NETWORK_MONGODB),
            resources_volume: volume(
                env.optional(vars::DOCKER_VOLUME_NAME_RESOURCES),
                env.optional(vars::DOCKER_VOLUME_TARGET_RESOURCES),
            ),
            logs_volume: volume(
                env.optional(vars::DOCKER_VOLUME_NAME_LOGS),
                env.optional(vars::DOCKER_VOLUME_TARGET_LOGS)
                    .or_else(|| env.optional(vars::DOCKET_VOLUME_TARGET_LOGS)),
            ),
        };

        let launcher = LauncherSettings {
            layout: SlotLayout::default(),
            engine_timeout: Duration::from_millis(
                env.parse(vars::PLATFORM_ENGINE_TIMEOUT_MS, 30_000)?,
            ),
            rollback: if env.flag(vars::PLATFORM_ROLLBACK_ON_FAILURE, false)? {
                RollbackPolicy::StopCreated
            } else {
                RollbackPolicy::Leave
            },
            shutdown_grace: Duration::from_millis(
                env.parse(vars::PLATFORM_SHUTDOWN_GRACE_MS, 5_000)?,
            ),
        };
        if launcher.engine_timeout.is_zero() {
            return Err(CoreError::configuration(format!(
                "{} must be positive",
                vars::PLATFORM_ENGINE_TIMEOUT_MS
            )));
        }

        let mut registry = WorkerRegistry::from_env_lists(
            &env.string(vars::SIMULATION_DOCKER_COMPONENTS, ""),
            &env.string(vars::SIMULATION_STATIC_COMPONENTS, ""),
        );
        if let Some(path) = env.optional(vars::SIMULATION_COMPONENT_REGISTRY) {
            let file = WorkerRegistry::load(&path)?;
            debug!(path = %path, types = file.len(), "loaded component registry");
            registry = registry.merged(file);
        }
        if registry.is_empty() {
            warn!("no component types registered; runs can only contain the manager and log writer");
        }

        Ok(Self {
            bus,
            store,
            common,
            manager,
            log_writer,
            engine,
            launcher,
            registry,
            metrics_file: env.optional(vars::PLATFORM_METRICS_FILE).map(PathBuf::from),
            run_definition: env
                .optional(vars::SIMULATION_CONFIGURATION_FILE)
                .map(PathBuf::from),
        })
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; empty counts as unset.
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &str) -> Result<String, CoreError> {
        self.optional(name)
            .ok_or_else(|| CoreError::configuration(format!("{name} is not set")))
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T, CoreError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| CoreError::configuration(format!("{name}={raw:?}: {e}"))),
        }
    }

    fn flag(&self, name: &str, default: bool) -> Result<bool, CoreError> {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| CoreError::configuration(format!("{name}={raw:?} is not a boolean"))),
        }
    }

    fn image(&self, name: &str) -> Result<ImageRef, CoreError> {
        let raw = self.required(name)?;
        raw.parse()
            .map_err(|e| CoreError::configuration(format!("{name}: {e}")))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `tcp://` engine addresses are served over plain HTTP.
fn docker_url(raw: &str) -> String {
    match raw.strip_prefix("tcp://") {
        Some(rest) => format!("http://{rest}"),
        None => raw.to_string(),
    }
}

fn volume(name: Option<String>, target: Option<String>) -> Option<VolumeBinding> {
    match (name, target) {
        (Some(name), Some(target)) => Some(VolumeBinding::new(name, target)),
        (Some(name), None) => {
            warn!(volume = %name, "volume has no target path; not mounted");
            None
        }
        _ => None,
    }
}
