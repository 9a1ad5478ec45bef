//! Environment snapshot owned by a [`Socon`](crate::Socon) handle

use std::collections::BTreeMap;

/// Environment variable naming the active project label.
pub const ACTIVE_PROJECT_VARIABLE: &str = "SOCON_ACTIVE_PROJECT";

/// Environment variables visible to the framework.
///
/// Taken from the process once; global options write here and never touch
/// the real process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environ {
    vars: BTreeMap<String, String>,
}

impl Environ {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Builder-style [`Environ::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// The active project label, if set and non-empty.
    pub fn active_project(&self) -> Option<&str> {
        self.get(ACTIVE_PROJECT_VARIABLE).filter(|p| !p.is_empty())
    }
}
