//! Instance attributes checked against the worker type's declaration.
use procem_model::{
    InstanceConfig, UnitEnv, WorkerType,
    run::{is_env_name, scalar_to_env},
};
use serde_json::{Map, Value};

use crate::CoreError;

/// Environment entries for one instance of a dynamic worker type.
///
/// Declared attributes map to their environment name and get defaults when omitted.
/// Undeclared types accept any key that is a valid environment name. Values must be scalars.
pub fn resolve_attributes(
    worker: &WorkerType,
    instance: &str,
    config: &InstanceConfig,
) -> Result<UnitEnv, CoreError> {
    check_declared(worker, instance, config)?;

    let mut env = UnitEnv::new();
    for (key, value) in config.attributes.iter() {
        let name = match worker.attributes.get(key) {
            Some(spec) => spec.environment.as_deref().unwrap_or(key.as_str()),
            None => key.as_str(),
        };
        if !is_env_name(name) {
            return Err(CoreError::configuration(format!(
                "{}/{instance}: {name:?} is not a valid parameter name",
                worker.name
            )));
        }
        let Some(value) = scalar_to_env(value) else {
            return Err(CoreError::configuration(format!(
                "{}/{instance}: attribute {key} must be a string, number or boolean",
                worker.name
            )));
        };
        env.push(name, value);
    }

    for (key, spec) in &worker.attributes {
        if config.attributes.contains_key(key) {
            continue;
        }
        if let Some(default) = &spec.default {
            let name = spec.environment.as_deref().unwrap_or(key);
            env.push(name, default.clone());
        }
    }
    Ok(env)
}

/// Attribute block of one static instance, as announced on the management bus.
pub fn static_attributes(
    worker: &WorkerType,
    instance: &str,
    config: &InstanceConfig,
) -> Result<Map<String, Value>, CoreError> {
    check_declared(worker, instance, config)?;

    let mut block: Map<String, Value> = config
        .attributes
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    for (key, spec) in &worker.attributes {
        if let Some(default) = &spec.default
            && !block.contains_key(key)
        {
            block.insert(key.clone(), Value::String(default.clone()));
        }
    }
    Ok(block)
}

fn check_declared(
    worker: &WorkerType,
    instance: &str,
    config: &InstanceConfig,
) -> Result<(), CoreError> {
    if !worker.declares_attributes() {
        return Ok(());
    }
    if let Some(unknown) = config
        .attributes
        .keys()
        .find(|k| !worker.attributes.contains_key(k.as_str()))
    {
        return Err(CoreError::configuration(format!(
            "{}/{instance}: unknown attribute {unknown}",
            worker.name
        )));
    }
    if let Some((missing, _)) = worker
        .attributes
        .iter()
        .find(|(k, spec)| !spec.optional && !config.attributes.contains_key(k.as_str()))
    {
        return Err(CoreError::configuration(format!(
            "{}/{instance}: missing required attribute {missing}",
            worker.name
        )));
    }
    Ok(())
}
