//! Settings modules
//!
//! A settings module is an ordered namespace of attributes. Only attributes
//! holding a plain value can become settings; attributes that alias another
//! module are kept so that the loading rules can skip them explicitly.

use std::path::Path;

use crate::Result;

/// A single attribute of a settings module.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingEntry {
    /// A plain value.
    Value(toml::Value),
    /// A reference to another module, never loaded as a setting.
    Module(String),
}

/// An ordered namespace of settings attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsModule {
    name: String,
    entries: Vec<(String, SettingEntry)>,
}

impl SettingsModule {
    /// Create an empty module with the given dotted name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Parse a module from TOML source. Top-level keys become attributes.
    pub fn from_toml_str(name: impl Into<String>, content: &str) -> Result<Self> {
        let table: toml::Table = content.parse()?;
        let mut module = Self::new(name);
        for (key, value) in table {
            module.insert(key, SettingEntry::Value(value));
        }
        Ok(module)
    }

    /// Read a TOML settings file. The module is named after the file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(?path, "loading settings file");
        Self::from_toml_str(path.display().to_string(), &content)
    }

    /// Add a value attribute.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.insert(key.into(), SettingEntry::Value(value.into()));
        self
    }

    /// Add an attribute aliasing another module.
    pub fn with_module(mut self, key: impl Into<String>, module: impl Into<String>) -> Self {
        self.insert(key.into(), SettingEntry::Module(module.into()));
        self
    }

    /// Insert or replace an attribute, keeping the original position on replace.
    pub fn insert(&mut self, key: String, entry: SettingEntry) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((key, entry)),
        }
    }

    /// The dotted name of the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a single attribute.
    pub fn get(&self, key: &str) -> Option<&SettingEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    /// Iterate over attributes in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SettingEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the module has no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_toml_str_reads_top_level_keys() {
        let module = SettingsModule::from_toml_str(
            "container.settings",
            r#"
INSTALLED_PROJECTS = ["a", "b"]
SKIP_ERROR_ON_PROJECTS_IMPORT = false

[LOGGING]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(module.name(), "container.settings");
        assert_eq!(module.len(), 3);
        assert!(matches!(
            module.get("SKIP_ERROR_ON_PROJECTS_IMPORT"),
            Some(SettingEntry::Value(toml::Value::Boolean(false)))
        ));
    }

    #[test]
    fn test_from_toml_str_rejects_invalid_source() {
        assert!(SettingsModule::from_toml_str("broken", "INSTALLED = [").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "FOO = \"foo\"").unwrap();

        let module = SettingsModule::from_file(file.path()).unwrap();
        assert_eq!(
            module.get("FOO"),
            Some(&SettingEntry::Value(toml::Value::String("foo".into())))
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let module = SettingsModule::new("m")
            .with_value("A", 1i64)
            .with_value("B", 2i64)
            .with_value("A", 3i64);

        let keys: Vec<&str> = module.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(module.get("A"), Some(&SettingEntry::Value(toml::Value::Integer(3))));
    }
}
