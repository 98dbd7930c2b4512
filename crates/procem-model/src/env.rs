use serde::{Deserialize, Serialize};

/// A single environment entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    key: String,
    value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// `KEY=VALUE`, as handed to the container engine.
    pub fn to_entry(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// Environment of one unit.
///
/// Stored as a list of key–value pairs; later entries override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitEnv(pub Vec<KeyValue>);

impl UnitEnv {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Get the value for a key, returning the last matching entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|kv| kv.key() == key)
    }

    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Builder form of [`UnitEnv::push`].
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.push(key, value);
        self
    }

    /// Concatenate; entries from `other` override entries of `self`.
    pub fn merged(&self, other: &UnitEnv) -> UnitEnv {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        UnitEnv(out)
    }

    /// Collapse overrides: one entry per key, holding the last value.
    ///
    /// Keys keep the position of their first occurrence.
    pub fn resolved(&self) -> UnitEnv {
        let mut out: Vec<KeyValue> = Vec::with_capacity(self.0.len());
        for kv in &self.0 {
            match out.iter_mut().find(|existing| existing.key == kv.key) {
                Some(existing) => existing.value.clone_from(&kv.value),
                None => out.push(kv.clone()),
            }
        }
        UnitEnv(out)
    }

    /// Flatten to `KEY=VALUE` entries with overrides applied.
    pub fn to_entries(&self) -> Vec<String> {
        self.resolved().iter().map(KeyValue::to_entry).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for UnitEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        UnitEnv(iter.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }
}
