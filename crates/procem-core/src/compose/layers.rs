use std::collections::BTreeMap;

use procem_model::UnitEnv;

/// Parameter layers in increasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Logging, topics and the run id.
    Common,
    /// Bus and backing store connection.
    Connection,
    /// Fixed parameters of the unit's role.
    Role,
    /// Overrides from the run definition for this instance.
    Instance,
}

/// Unit parameters kept per layer until they are resolved.
#[derive(Debug, Clone, Default)]
pub struct LayeredEnv {
    layers: BTreeMap<Layer, UnitEnv>,
}

impl LayeredEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries to a layer.
    pub fn extend(&mut self, layer: Layer, env: UnitEnv) {
        let slot = self.layers.entry(layer).or_default();
        *slot = slot.merged(&env);
    }

    pub fn set(&mut self, layer: Layer, key: impl Into<String>, value: impl Into<String>) {
        self.layers.entry(layer).or_default().push(key, value);
    }

    /// Layer that provides the effective value of `key`.
    pub fn source_of(&self, key: &str) -> Option<Layer> {
        self.layers
            .iter()
            .rev()
            .find(|(_, env)| env.contains(key))
            .map(|(layer, _)| *layer)
    }

    /// One entry per key; higher layers win, later entries within a layer win.
    pub fn resolve(&self) -> UnitEnv {
        self.layers
            .values()
            .fold(UnitEnv::new(), |acc, env| acc.merged(env))
            .resolved()
    }
}
