//! Pass-through tuning options for the frame processor.
//!
//! Keys and values are owned by the processor; the integrator never parses
//! them. Processors name options with hyphens (`fast-threshold`), while
//! configuration files use underscores (`fast_threshold`), so overrides are
//! matched on the underscore form.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

/// Opaque string → string option map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoOptions {
    entries: BTreeMap<String, String>,
}

/// Configuration-style name of a processor option key.
pub fn param_name(key: &str) -> String {
    key.replace('-', "_")
}

impl VoOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply configured overrides onto this (default) option set.
    ///
    /// Only keys already present are overridden; an override named
    /// `a_b` replaces option `a-b`. Returns the number of options changed.
    pub fn apply_overrides(&mut self, params: &BTreeMap<String, String>) -> usize {
        let mut applied = 0;
        for (key, value) in self.entries.iter_mut() {
            if let Some(v) = params.get(&param_name(key)) {
                *value = v.clone();
                applied += 1;
            }
        }
        for name in params.keys() {
            if !self.entries.keys().any(|k| param_name(k) == *name) {
                debug!("Ignoring unknown odometry option '{}'", name);
            }
        }
        applied
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VoOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One `key = value` line per option, keys in configuration form.
impl fmt::Display for VoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "{} = {}", param_name(key), value)?;
        }
        Ok(())
    }
}
