//! Resolved settings objects
//!
//! [`Settings`] is built from settings modules and remembers which keys came
//! from an explicit (user) module. [`UserSettingsHolder`] layers local values
//! over another wrapper and is used both by `configure()` and by temporary
//! overrides.

use std::collections::{BTreeMap, BTreeSet};

use crate::{Error, Result, SettingEntry, SettingsModule};

/// Whether `name` qualifies as a setting: at least one letter, no lower-case.
pub fn is_setting_name(name: &str) -> bool {
    name.chars().any(char::is_alphabetic) && !name.chars().any(char::is_lowercase)
}

/// Settings loaded from one or more settings modules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    settings_module: String,
    values: BTreeMap<String, toml::Value>,
    explicit: BTreeSet<String>,
}

impl Settings {
    /// Create empty settings bound to a module name.
    pub fn new(settings_module: impl Into<String>) -> Self {
        Self {
            settings_module: settings_module.into(),
            values: BTreeMap::new(),
            explicit: BTreeSet::new(),
        }
    }

    /// Load the upper-case, non-private, non-module attributes of `module`.
    pub fn add_settings(&mut self, module: &SettingsModule, is_explicit: bool) {
        for (key, entry) in module.entries() {
            if key.starts_with('_') || !is_setting_name(key) {
                continue;
            }
            let SettingEntry::Value(value) = entry else {
                continue;
            };
            self.values.insert(key.to_string(), value.clone());
            if is_explicit {
                self.explicit.insert(key.to_string());
            }
        }
    }

    /// Name of the module these settings were loaded from.
    pub fn settings_module(&self) -> &str {
        &self.settings_module
    }

    pub fn get(&self, name: &str) -> Option<&toml::Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: toml::Value) {
        self.values.insert(name.into(), value);
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.values
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::SettingNotFound(name.to_string()))
    }

    /// Whether `name` was set by an explicit module.
    pub fn is_overridden(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    /// Sorted setting names.
    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Local values layered over another settings wrapper.
///
/// Lookups that miss locally fall through to `defaults`, unless the key was
/// deleted through this holder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSettingsHolder {
    defaults: Option<Box<SettingsWrapper>>,
    values: BTreeMap<String, toml::Value>,
    deleted: BTreeSet<String>,
}

impl UserSettingsHolder {
    pub fn new(defaults: Option<SettingsWrapper>) -> Self {
        Self {
            defaults: defaults.map(Box::new),
            values: BTreeMap::new(),
            deleted: BTreeSet::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&toml::Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value);
        }
        if !is_setting_name(name) || self.deleted.contains(name) {
            return None;
        }
        self.defaults.as_deref().and_then(|d| d.get(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: toml::Value) {
        let name = name.into();
        self.deleted.remove(&name);
        self.values.insert(name, value);
    }

    /// Hide `name`, whether it is defined locally, in the defaults, or nowhere.
    pub fn delete(&mut self, name: &str) {
        self.deleted.insert(name.to_string());
        self.values.remove(name);
    }

    pub fn is_overridden(&self, name: &str) -> bool {
        self.deleted.contains(name)
            || self.values.contains_key(name)
            || self
                .defaults
                .as_deref()
                .is_some_and(|d| d.is_overridden(name))
    }

    /// Sorted names visible through this holder.
    pub fn names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.values.keys().cloned().collect();
        if let Some(defaults) = self.defaults.as_deref() {
            names.extend(defaults.names());
        }
        names
            .into_iter()
            .filter(|n| !self.deleted.contains(n))
            .collect()
    }

    /// Give back the wrapper this holder delegates to.
    pub fn into_defaults(self) -> Option<SettingsWrapper> {
        self.defaults.map(|d| *d)
    }
}

/// The object a [`LazySettings`](crate::LazySettings) resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsWrapper {
    Settings(Settings),
    Holder(UserSettingsHolder),
}

impl SettingsWrapper {
    pub fn get(&self, name: &str) -> Option<&toml::Value> {
        match self {
            Self::Settings(s) => s.get(name),
            Self::Holder(h) => h.get(name),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: toml::Value) {
        match self {
            Self::Settings(s) => s.set(name, value),
            Self::Holder(h) => h.set(name, value),
        }
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        match self {
            Self::Settings(s) => s.delete(name),
            Self::Holder(h) => {
                h.delete(name);
                Ok(())
            }
        }
    }

    pub fn is_overridden(&self, name: &str) -> bool {
        match self {
            Self::Settings(s) => s.is_overridden(name),
            Self::Holder(h) => h.is_overridden(name),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            Self::Settings(s) => s.names(),
            Self::Holder(h) => h.names(),
        }
    }

    /// The settings module name; `None` for manually configured settings.
    pub fn settings_module(&self) -> Option<&str> {
        match self {
            Self::Settings(s) => Some(s.settings_module()),
            Self::Holder(_) => None,
        }
    }
}
