//! Environment variable names shared by the platform configuration (read side)
//! and the unit parameter composer (write side).

// message bus
pub const RABBITMQ_HOST: &str = "RABBITMQ_HOST";
pub const RABBITMQ_PORT: &str = "RABBITMQ_PORT";
pub const RABBITMQ_LOGIN: &str = "RABBITMQ_LOGIN";
pub const RABBITMQ_PASSWORD: &str = "RABBITMQ_PASSWORD";
pub const RABBITMQ_SSL: &str = "RABBITMQ_SSL";
pub const RABBITMQ_SSL_VERSION: &str = "RABBITMQ_SSL_VERSION";
pub const RABBITMQ_EXCHANGE: &str = "RABBITMQ_EXCHANGE";
pub const RABBITMQ_EXCHANGE_AUTODELETE: &str = "RABBITMQ_EXCHANGE_AUTODELETE";
pub const RABBITMQ_EXCHANGE_DURABLE: &str = "RABBITMQ_EXCHANGE_DURABLE";
pub const RABBITMQ_EXCHANGE_PREFIX: &str = "RABBITMQ_EXCHANGE_PREFIX";
pub const RABBITMQ_MANAGEMENT_URL: &str = "RABBITMQ_MANAGEMENT_URL";
pub const RABBITMQ_VHOST: &str = "RABBITMQ_VHOST";

// backing store
pub const MONGODB_HOST: &str = "MONGODB_HOST";
pub const MONGODB_PORT: &str = "MONGODB_PORT";
pub const MONGODB_USERNAME: &str = "MONGODB_USERNAME";
pub const MONGODB_PASSWORD: &str = "MONGODB_PASSWORD";
pub const MONGODB_DATABASE: &str = "MONGODB_DATABASE";
pub const MONGODB_ADMIN: &str = "MONGODB_ADMIN";
pub const MONGODB_APPNAME: &str = "MONGODB_APPNAME";
pub const MONGODB_METADATA_COLLECTION: &str = "MONGODB_METADATA_COLLECTION";
pub const MONGODB_MESSAGES_COLLECTION_PREFIX: &str = "MONGODB_MESSAGES_COLLECTION_PREFIX";

// common to every unit
pub const SIMULATION_ID: &str = "SIMULATION_ID";
pub const SIMULATION_COMPONENT_NAME: &str = "SIMULATION_COMPONENT_NAME";
pub const SIMULATION_LOG_LEVEL: &str = "SIMULATION_LOG_LEVEL";
pub const SIMULATION_LOG_FILE: &str = "SIMULATION_LOG_FILE";
pub const SIMULATION_LOG_FORMAT: &str = "SIMULATION_LOG_FORMAT";
pub const SIMULATION_STATE_MESSAGE_TOPIC: &str = "SIMULATION_STATE_MESSAGE_TOPIC";
pub const SIMULATION_EPOCH_MESSAGE_TOPIC: &str = "SIMULATION_EPOCH_MESSAGE_TOPIC";
pub const SIMULATION_STATUS_MESSAGE_TOPIC: &str = "SIMULATION_STATUS_MESSAGE_TOPIC";
pub const SIMULATION_ERROR_MESSAGE_TOPIC: &str = "SIMULATION_ERROR_MESSAGE_TOPIC";

// manager
pub const SIMULATION_MANAGER_NAME: &str = "SIMULATION_MANAGER_NAME";
pub const SIMULATION_EPOCH_TIMER_INTERVAL: &str = "SIMULATION_EPOCH_TIMER_INTERVAL";
pub const SIMULATION_MAX_EPOCH_RESENDS: &str = "SIMULATION_MAX_EPOCH_RESENDS";
pub const SIMULATION_NAME: &str = "SIMULATION_NAME";
pub const SIMULATION_DESCRIPTION: &str = "SIMULATION_DESCRIPTION";
pub const SIMULATION_COMPONENTS: &str = "SIMULATION_COMPONENTS";
pub const SIMULATION_INITIAL_START_TIME: &str = "SIMULATION_INITIAL_START_TIME";
pub const SIMULATION_EPOCH_LENGTH: &str = "SIMULATION_EPOCH_LENGTH";
pub const SIMULATION_MAX_EPOCHS: &str = "SIMULATION_MAX_EPOCHS";

// log writer
pub const MESSAGE_BUFFER_MAX_DOCUMENTS: &str = "MESSAGE_BUFFER_MAX_DOCUMENTS";
pub const MESSAGE_BUFFER_MAX_INTERVAL: &str = "MESSAGE_BUFFER_MAX_INTERVAL";

// platform only, never forwarded to units
pub const SIMULATION_MANAGER_IMAGE: &str = "SIMULATION_MANAGER_IMAGE";
pub const SIMULATION_LOGWRITER_IMAGE: &str = "SIMULATION_LOGWRITER_IMAGE";
pub const SIMULATION_DOCKER_COMPONENTS: &str = "SIMULATION_DOCKER_COMPONENTS";
pub const SIMULATION_STATIC_COMPONENTS: &str = "SIMULATION_STATIC_COMPONENTS";
pub const SIMULATION_COMPONENT_REGISTRY: &str = "SIMULATION_COMPONENT_REGISTRY";
pub const SIMULATION_CONFIGURATION_FILE: &str = "SIMULATION_CONFIGURATION_FILE";

pub const DOCKER_HOST: &str = "DOCKER_HOST";
pub const DOCKER_NETWORK_PLATFORM: &str = "DOCKER_NETWORK_PLATFORM";
pub const DOCKER_NETWORK_RABBITMQ: &str = "DOCKER_NETWORK_RABBITMQ";
pub const DOCKER_NETWORK_MONGODB: &str = "DOCKER_NETWORK_MONGODB";
pub const DOCKER_VOLUME_NAME_RESOURCES: &str = "DOCKER_VOLUME_NAME_RESOURCES";
pub const DOCKER_VOLUME_TARGET_RESOURCES: &str = "DOCKER_VOLUME_TARGET_RESOURCES";
pub const DOCKER_VOLUME_NAME_LOGS: &str = "DOCKER_VOLUME_NAME_LOGS";
pub const DOCKER_VOLUME_TARGET_LOGS: &str = "DOCKER_VOLUME_TARGET_LOGS";
/// Misspelled name still found in older deployment files.
pub const DOCKET_VOLUME_TARGET_LOGS: &str = "DOCKET_VOLUME_TARGET_LOGS";

pub const PLATFORM_ENGINE_TIMEOUT_MS: &str = "PLATFORM_ENGINE_TIMEOUT_MS";
pub const PLATFORM_ROLLBACK_ON_FAILURE: &str = "PLATFORM_ROLLBACK_ON_FAILURE";
pub const PLATFORM_SHUTDOWN_GRACE_MS: &str = "PLATFORM_SHUTDOWN_GRACE_MS";
pub const PLATFORM_METRICS_FILE: &str = "PLATFORM_METRICS_FILE";
