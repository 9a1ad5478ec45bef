//! A single registry of configurations

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ConfigKind, Configuration, RegistryKind};
use crate::loader::Catalog;
use crate::{Error, Result};

/// An identifier to install: a name resolved by the factory, or a prebuilt
/// configuration.
#[derive(Debug, Clone)]
pub enum RegistryEntry {
    Name(String),
    Config(Arc<Configuration>),
}

impl From<&str> for RegistryEntry {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for RegistryEntry {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Arc<Configuration>> for RegistryEntry {
    fn from(config: Arc<Configuration>) -> Self {
        Self::Config(config)
    }
}

impl From<Configuration> for RegistryEntry {
    fn from(config: Configuration) -> Self {
        Self::Config(Arc::new(config))
    }
}

/// Full mutable state of a registry, captured by
/// [`BaseRegistry::store_state`].
#[derive(Debug, Clone, Default)]
pub struct RegistryState {
    configs: Vec<Arc<Configuration>>,
    unregistered: Vec<(String, Arc<Error>)>,
    registry_ready: bool,
    managers_ready: bool,
    lock: bool,
}

/// A named collection of configurations with population and locking
/// semantics.
///
/// Lifecycle: `unpopulated -> registry_ready -> managers_ready`. A locked
/// registry ignores further population until its state is restored.
#[derive(Debug)]
pub struct BaseRegistry {
    kind: RegistryKind,
    state: RegistryState,
    stored: Vec<RegistryState>,
}

impl BaseRegistry {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            state: RegistryState::default(),
            stored: Vec::new(),
        }
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn config_kind(&self) -> ConfigKind {
        self.kind.config_kind()
    }

    /// Singular form of the registry name, e.g. `project`.
    pub fn single_registry_name(&self) -> &str {
        let name = self.name();
        name.strip_suffix('s').unwrap_or(name)
    }

    pub fn registry_ready(&self) -> bool {
        self.state.registry_ready
    }

    pub fn managers_ready(&self) -> bool {
        self.state.managers_ready
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock
    }

    /// Identifiers that failed to load, in installation order.
    pub fn unregistered_configs(&self) -> &[(String, Arc<Error>)] {
        &self.state.unregistered
    }

    /// First phase of population: build, validate and install configurations.
    ///
    /// Returns the configurations added by this call, or `None` when the
    /// registry is locked. Labels are checked as each configuration is
    /// inserted; names are checked once every identifier has been resolved.
    /// The caller imports managers for the returned configurations and then
    /// calls [`BaseRegistry::mark_managers_ready`].
    pub fn populate_configs(
        &mut self,
        entries: impl IntoIterator<Item = RegistryEntry>,
        skip_error: bool,
        lock: bool,
        catalog: &Catalog,
    ) -> Result<Option<Vec<Arc<Configuration>>>> {
        if self.state.lock {
            return Ok(None);
        }
        if lock {
            self.state.lock = true;
        }

        let mut added = Vec::new();
        for entry in entries {
            let config = match entry {
                RegistryEntry::Config(config) => config,
                RegistryEntry::Name(name) => {
                    match Configuration::create(&name, self.config_kind(), catalog) {
                        Ok(config) => Arc::new(config),
                        Err(err) if skip_error => {
                            tracing::warn!(registry = self.name(), entry = %name, error = %err, "skipping configuration");
                            self.record_unregistered(name, err);
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
            };

            if self.state.configs.iter().any(|c| c.label() == config.label()) {
                return Err(Error::ImproperlyConfigured(format!(
                    "{} labels aren't unique, duplicates: {}",
                    title(self.single_registry_name()),
                    config.label()
                )));
            }
            config.set_registry(self.kind)?;
            tracing::debug!(registry = self.name(), label = config.label(), name = config.name(), "configuration installed");
            self.state.configs.push(Arc::clone(&config));
            added.push(config);
        }

        let duplicates = self.duplicate_names();
        if !duplicates.is_empty() {
            return Err(Error::ImproperlyConfigured(format!(
                "{} names aren't unique, duplicates: {}",
                title(self.single_registry_name()),
                duplicates.join(", ")
            )));
        }

        self.state.registry_ready = true;
        Ok(Some(added))
    }

    /// Second phase of population done.
    pub fn mark_managers_ready(&mut self) {
        self.state.managers_ready = true;
    }

    fn record_unregistered(&mut self, entry: String, err: Error) {
        let err = Arc::new(err);
        match self.state.unregistered.iter_mut().find(|(e, _)| *e == entry) {
            Some((_, existing)) => *existing = err,
            None => self.state.unregistered.push((entry, err)),
        }
    }

    fn duplicate_names(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for config in &self.state.configs {
            *counts.entry(config.name()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Fail with a not-ready error unless population completed.
    pub fn check_registry_ready(&self) -> Result<()> {
        if !self.state.registry_ready {
            return Err(Error::RegistryNotReady(format!(
                "{} aren't loaded yet.",
                title(self.name())
            )));
        }
        Ok(())
    }

    /// Whether a configuration with this full name is installed.
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        self.check_registry_ready()?;
        Ok(self.state.configs.iter().any(|c| c.name() == name))
    }

    /// Installed configurations, in installation order.
    pub fn get_registry_configs(&self) -> Result<&[Arc<Configuration>]> {
        self.check_registry_ready()?;
        Ok(&self.state.configs)
    }

    /// Labels of installed configurations, in installation order.
    pub fn labels(&self) -> Result<Vec<String>> {
        Ok(self
            .get_registry_configs()?
            .iter()
            .map(|c| c.label().to_string())
            .collect())
    }

    /// The configuration with `label`.
    pub fn get_registry_config(&self, label: &str) -> Result<Arc<Configuration>> {
        self.check_registry_ready()?;
        if let Some(config) = self.state.configs.iter().find(|c| c.label() == label) {
            return Ok(Arc::clone(config));
        }
        let mut message = format!(
            "No installed {} with label '{label}'.",
            self.single_registry_name()
        );
        if let Some(config) = self.state.configs.iter().find(|c| c.name() == label) {
            message.push_str(&format!(" Did you mean '{}'?", config.label()));
        }
        Err(Error::Lookup(message))
    }

    /// The most specific configuration whose name contains `object_name`.
    ///
    /// A configuration named `a.b` contains `a.b` and `a.b.c`, never `a.bc`.
    pub fn get_containing_registry_config(
        &self,
        object_name: &str,
    ) -> Result<Option<Arc<Configuration>>> {
        self.check_registry_ready()?;
        Ok(self
            .state
            .configs
            .iter()
            .filter(|c| contains_object(c.name(), object_name))
            .max_by_key(|c| c.name().len())
            .cloned())
    }

    /// Push the current state and start over from an empty registry.
    pub fn store_state(&mut self) {
        let state = std::mem::take(&mut self.state);
        self.stored.push(state);
    }

    /// Restore the most recently stored state. Returns `false` when nothing
    /// was stored.
    pub fn restore_state(&mut self) -> bool {
        match self.stored.pop() {
            Some(state) => {
                self.state = state;
                true
            }
            None => false,
        }
    }

    /// Number of stored states.
    pub fn stored_depth(&self) -> usize {
        self.stored.len()
    }
}

fn contains_object(config_name: &str, object_name: &str) -> bool {
    match object_name.strip_prefix(config_name) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

fn title(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ModuleDef;
    use crate::registry::ConfigClass;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn catalog() -> Catalog {
        Catalog::new()
            .with(ModuleDef::new("pkg").path("/srv/pkg"))
            .with(ModuleDef::new("pkg.sub"))
            .with(ModuleDef::new("pkg.other"))
            .with(
                ModuleDef::new("pkg.classes")
                    .config(ConfigClass::new("Plain", ConfigKind::Project).name("pkg.sub"))
                    .config(
                        ConfigClass::new("Relabeled", ConfigKind::Project)
                            .name("pkg.sub")
                            .label("relabeled"),
                    ),
            )
    }

    fn populate(registry: &mut BaseRegistry, entries: &[&str]) -> Result<Option<Vec<Arc<Configuration>>>> {
        registry.populate_configs(
            entries.iter().map(|e| RegistryEntry::from(*e)),
            false,
            true,
            &catalog(),
        )
    }

    #[test]
    fn test_single_registry_name() {
        assert_eq!(BaseRegistry::new(RegistryKind::Projects).single_registry_name(), "project");
        assert_eq!(BaseRegistry::new(RegistryKind::Common).single_registry_name(), "common");
    }

    #[test]
    fn test_populate_installs_in_order() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        let added = populate(&mut registry, &["pkg.sub", "pkg", "pkg.other"])
            .unwrap()
            .unwrap();

        assert_eq!(added.len(), 3);
        assert!(registry.registry_ready());
        assert!(!registry.managers_ready());
        assert_eq!(registry.labels().unwrap(), vec!["sub", "pkg", "other"]);
        assert_eq!(added[0].registry(), Some(RegistryKind::Projects));
    }

    #[test]
    fn test_populate_accepts_prebuilt_configs() {
        let config = Configuration::create("pkg.sub", ConfigKind::Registry, &catalog()).unwrap();
        let mut registry = BaseRegistry::new(RegistryKind::Common);
        registry
            .populate_configs([RegistryEntry::from(config)], false, true, &catalog())
            .unwrap();
        assert_eq!(registry.get_registry_configs().unwrap().len(), 1);
    }

    #[test]
    fn test_locked_registry_ignores_population() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        populate(&mut registry, &["pkg.sub"]).unwrap();
        assert!(registry.is_locked());
        assert!(populate(&mut registry, &["pkg.other"]).unwrap().is_none());
        assert_eq!(registry.labels().unwrap(), vec!["sub"]);
    }

    #[test]
    fn test_unlocked_registry_accumulates() {
        let mut registry = BaseRegistry::new(RegistryKind::Common);
        registry
            .populate_configs([RegistryEntry::from("pkg.sub")], false, false, &catalog())
            .unwrap();
        registry
            .populate_configs([RegistryEntry::from("pkg.other")], false, true, &catalog())
            .unwrap();
        assert_eq!(registry.labels().unwrap(), vec!["sub", "other"]);
    }

    #[test]
    fn test_duplicate_labels() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        let err = populate(&mut registry, &["pkg.classes.Plain", "pkg.sub"]).unwrap_err();
        assert_eq!(err.to_string(), "Project labels aren't unique, duplicates: sub");
        assert!(!registry.registry_ready());
    }

    #[test]
    fn test_duplicate_names() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        let err = populate(&mut registry, &["pkg.classes.Relabeled", "pkg.sub"]).unwrap_err();
        assert_eq!(err.to_string(), "Project names aren't unique, duplicates: pkg.sub");
    }

    #[test]
    fn test_label_collision_reported_before_names() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        let err = populate(&mut registry, &["pkg.sub", "pkg.classes.Plain"]).unwrap_err();
        assert!(err.to_string().starts_with("Project labels aren't unique"));
    }

    #[test]
    fn test_skip_error_records_unregistered() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        registry
            .populate_configs(
                ["pkg.sub", "missing", "pkg.other"].map(RegistryEntry::from),
                true,
                true,
                &catalog(),
            )
            .unwrap();

        assert_eq!(registry.labels().unwrap(), vec!["sub", "other"]);
        let unregistered = registry.unregistered_configs();
        assert_eq!(unregistered.len(), 1);
        assert_eq!(unregistered[0].0, "missing");
        assert_eq!(unregistered[0].1.to_string(), "No module named 'missing'");
    }

    #[test]
    fn test_queries_before_population() {
        let registry = BaseRegistry::new(RegistryKind::Projects);
        let err = registry.get_containing_registry_config("foo").unwrap_err();
        assert!(matches!(err, Error::RegistryNotReady(_)));
        assert_eq!(err.to_string(), "Projects aren't loaded yet.");
        assert!(registry.is_installed("pkg").is_err());
        assert!(registry.get_registry_config("pkg").is_err());
    }

    #[test]
    fn test_get_registry_config_suggests_label() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        populate(&mut registry, &["pkg.sub"]).unwrap();

        assert_eq!(registry.get_registry_config("sub").unwrap().name(), "pkg.sub");
        let err = registry.get_registry_config("pkg.sub").unwrap_err();
        assert_eq!(
            err.to_string(),
            "No installed project with label 'pkg.sub'. Did you mean 'sub'?"
        );
        let err = registry.get_registry_config("admindocs").unwrap_err();
        assert_eq!(err.to_string(), "No installed project with label 'admindocs'.");
    }

    #[rstest]
    #[case("pkg", Some("pkg"))]
    #[case("pkg.sub", Some("pkg.sub"))]
    #[case("pkg.sub.mod", Some("pkg.sub"))]
    #[case("pkg.subway", Some("pkg"))]
    #[case("pkg_foo", None)]
    #[case("foo", None)]
    fn test_get_containing_registry_config(#[case] object: &str, #[case] expected: Option<&str>) {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        populate(&mut registry, &["pkg", "pkg.sub"]).unwrap();

        let found = registry.get_containing_registry_config(object).unwrap();
        assert_eq!(found.as_ref().map(|c| c.name()), expected);
    }

    #[test]
    fn test_is_installed_uses_full_name() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        populate(&mut registry, &["pkg.sub"]).unwrap();
        assert!(registry.is_installed("pkg.sub").unwrap());
        assert!(!registry.is_installed("sub").unwrap());
    }

    #[test]
    fn test_store_and_restore_are_lifo() {
        let mut registry = BaseRegistry::new(RegistryKind::Projects);
        populate(&mut registry, &["pkg"]).unwrap();

        registry.store_state();
        assert!(!registry.registry_ready());
        populate(&mut registry, &["pkg.sub"]).unwrap();

        registry.store_state();
        populate(&mut registry, &["pkg.other"]).unwrap();
        assert_eq!(registry.labels().unwrap(), vec!["other"]);

        assert!(registry.restore_state());
        assert_eq!(registry.labels().unwrap(), vec!["sub"]);
        assert!(registry.restore_state());
        assert_eq!(registry.labels().unwrap(), vec!["pkg"]);
        assert!(registry.is_locked());
        assert!(!registry.restore_state());
    }
}
