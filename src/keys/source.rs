//! Named string-valued configuration sources.
//!
//! The key manager does not care how configuration is loaded, only which
//! names it asks for and in which order the sources are consulted.

use std::collections::HashMap;

/// A key/value lookup the master key can be resolved from.
pub trait ConfigSource: Send + Sync {
    /// Short name used in log lines (never the value).
    fn name(&self) -> &str;

    /// Return the value for `key`, or `None` if unset.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// An explicit in-memory map, for injected configuration and tests.
#[derive(Debug, Clone)]
pub struct MapSource {
    name: String,
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
