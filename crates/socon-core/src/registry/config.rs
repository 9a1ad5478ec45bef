//! Configurations and the factory building them from identifiers

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use socon_conf::{LazySettings, SettingsLoader};

use crate::loader::{Attr, Catalog};
use crate::{Error, Result};

/// Module every configuration may declare managers in.
pub const MANAGER_MODULE_NAME: &str = "managers";

/// Default settings module of a project, relative to its package.
pub const DEFAULT_PROJECT_SETTINGS_MODULE: &str = "management.config";

/// The family a configuration class belongs to.
///
/// `Plugin` and `Project` are specializations of `Registry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    Registry,
    Plugin,
    Project,
}

impl ConfigKind {
    /// Submodule searched for configuration classes.
    pub fn lookup_module_name(self) -> &'static str {
        match self {
            Self::Registry => "config",
            Self::Plugin => "plugins",
            Self::Project => "projects",
        }
    }

    /// Name of the default class of this kind.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Registry => "RegistryConfig",
            Self::Plugin => "PluginConfig",
            Self::Project => "ProjectConfig",
        }
    }

    /// Whether a class of kind `other` can be used where `self` is expected.
    pub fn accepts(self, other: ConfigKind) -> bool {
        self == Self::Registry || self == other
    }
}

/// The registry a configuration is installed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryKind {
    Common,
    Plugins,
    Projects,
}

impl RegistryKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Plugins => "plugins",
            Self::Projects => "projects",
        }
    }

    /// Kind of configuration this registry builds.
    pub fn config_kind(self) -> ConfigKind {
        match self {
            Self::Common => ConfigKind::Registry,
            Self::Plugins => ConfigKind::Plugin,
            Self::Projects => ConfigKind::Project,
        }
    }

    /// Registries from least to most important.
    pub fn by_importance_order() -> [RegistryKind; 3] {
        [Self::Common, Self::Plugins, Self::Projects]
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A user-declared configuration class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigClass {
    class_name: String,
    module: String,
    kind: ConfigKind,
    name: Option<String>,
    label: Option<String>,
    path: Option<PathBuf>,
    settings_module: Option<String>,
}

impl ConfigClass {
    pub fn new(class_name: impl Into<String>, kind: ConfigKind) -> Self {
        Self {
            class_name: class_name.into(),
            module: String::new(),
            kind,
            name: None,
            label: None,
            path: None,
            settings_module: None,
        }
    }

    /// Full name of the configured module.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Settings module of a project, relative to its package.
    pub fn settings_module(mut self, module: impl Into<String>) -> Self {
        self.settings_module = Some(module.into());
        self
    }

    pub(crate) fn defined_in(mut self, module: &str) -> Self {
        self.module = module.to_string();
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn kind(&self) -> ConfigKind {
        self.kind
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.class_name)
    }
}

/// A loadable unit: the framework core, a plugin or a project.
pub struct Configuration {
    name: String,
    label: String,
    path: PathBuf,
    kind: ConfigKind,
    class_name: String,
    registry: OnceCell<RegistryKind>,
    settings: Option<LazySettings>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", self.class_name, self.name)
    }
}

impl Configuration {
    /// Build a configuration from an installed identifier.
    ///
    /// `entry` is either a module, in which case its conventional submodule
    /// may hold exactly one configuration class of the right kind, or the
    /// dotted path of a configuration class.
    pub fn create(entry: &str, kind: ConfigKind, catalog: &Catalog) -> Result<Self> {
        let (config_name, class) = if catalog.contains(entry) {
            let lookup = format!("{entry}.{}", kind.lookup_module_name());
            let single = catalog.module(&lookup).and_then(|module| {
                match module.config_classes(kind).as_slice() {
                    [candidate] => Some((*candidate).clone()),
                    _ => None,
                }
            });
            match single {
                Some(class) => (class_config_name(entry, &class)?, Some(class)),
                None => (entry.to_string(), None),
            }
        } else {
            let class = match catalog.import_string(entry) {
                Ok(Attr::Config(found)) if kind.accepts(found.kind()) => found.clone(),
                Ok(_) => {
                    return Err(Error::ImproperlyConfigured(format!(
                        "'{entry}' isn't a subclass of {}.",
                        kind.class_name()
                    )));
                }
                Err(_) => return Err(missing_entry(entry, kind, catalog)),
            };
            (class_config_name(entry, &class)?, Some(class))
        };

        if !catalog.contains(&config_name) {
            let qualified = class
                .as_ref()
                .map(ConfigClass::qualified_name)
                .unwrap_or_else(|| kind.class_name().to_string());
            return Err(Error::ImproperlyConfigured(format!(
                "Cannot import '{config_name}'. Check that '{qualified}.name' is correct."
            )));
        }

        Self::from_class(config_name, class.as_ref(), kind, catalog)
    }

    fn from_class(
        name: String,
        class: Option<&ConfigClass>,
        kind: ConfigKind,
        catalog: &Catalog,
    ) -> Result<Self> {
        let class_name = class
            .map(|c| c.class_name.clone())
            .unwrap_or_else(|| kind.class_name().to_string());
        let label = class
            .and_then(|c| c.label.clone())
            .unwrap_or_else(|| last_component(&name).to_string());
        let path = class
            .and_then(|c| c.path.clone())
            .or_else(|| catalog.module_path(&name))
            .ok_or_else(|| {
                Error::ImproperlyConfigured(format!(
                    "The config module {name} has no filesystem location, you must \
                     configure this config with a {class_name} subclass with a 'path' \
                     class attribute."
                ))
            })?;

        let settings = (kind == ConfigKind::Project).then(|| {
            let relative = class
                .and_then(|c| c.settings_module.as_deref())
                .unwrap_or(DEFAULT_PROJECT_SETTINGS_MODULE);
            let package = package_name(&name, kind, catalog);
            LazySettings::for_module(format!("{package}.{relative}"))
        });

        Ok(Self {
            name,
            label,
            path,
            kind,
            class_name,
            registry: OnceCell::new(),
            settings,
        })
    }

    /// Fully qualified module name, unique across registries.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short name, unique within a registry.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ConfigKind {
        self.kind
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The registry holding this configuration, once installed.
    pub fn registry(&self) -> Option<RegistryKind> {
        self.registry.get().copied()
    }

    /// Attach the configuration to a registry. Assigned once.
    pub(crate) fn set_registry(&self, registry: RegistryKind) -> Result<()> {
        let current = *self.registry.get_or_init(|| registry);
        if current != registry {
            return Err(Error::ImproperlyConfigured(format!(
                "{} is already installed in the {} registry",
                self.name, current
            )));
        }
        Ok(())
    }

    /// Dotted name of the managers module of this configuration.
    pub fn managers_module(&self) -> String {
        format!("{}.{}", self.name, MANAGER_MODULE_NAME)
    }

    /// Lazy project settings. `None` for non-project configurations.
    pub fn settings(&self) -> Option<&LazySettings> {
        self.settings.as_ref()
    }

    /// Name of the project settings module.
    pub fn settings_module(&self) -> Option<&str> {
        match self.settings.as_ref().map(LazySettings::source) {
            Some(socon_conf::SettingsSource::Module(module)) => Some(module),
            _ => None,
        }
    }

    /// Read a project setting.
    ///
    /// A missing setting is an error unless `skip` is set, in which case
    /// `default` is returned. Failing to load the settings module is always
    /// an error.
    pub fn get_setting(
        &self,
        loader: &dyn SettingsLoader,
        name: &str,
        default: Option<toml::Value>,
        skip: bool,
    ) -> Result<Option<toml::Value>> {
        let missing = || Error::MissingSetting {
            name: name.to_string(),
            label: self.label.clone(),
        };
        let settings = self.settings.as_ref().ok_or_else(missing)?;
        match settings.get(loader, name) {
            Ok(value) => Ok(Some(value.clone())),
            Err(socon_conf::Error::SettingNotFound(_)) if skip => Ok(default),
            Err(socon_conf::Error::SettingNotFound(_)) => Err(missing()),
            Err(err) => Err(err.into()),
        }
    }
}

fn class_config_name(entry: &str, class: &ConfigClass) -> Result<String> {
    class.name.clone().ok_or_else(|| {
        Error::ImproperlyConfigured(format!("'{entry}' must supply a name attribute."))
    })
}

fn last_component(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, last)| last)
}

/// The package holding a configuration: its module, or the parent when the
/// configuration names a plain `<package>.<lookup>` module.
fn package_name(name: &str, kind: ConfigKind, catalog: &Catalog) -> String {
    let suffix = format!(".{}", kind.lookup_module_name());
    match name.strip_suffix(&suffix) {
        Some(package) if !catalog.is_package(name) => package.to_string(),
        _ => name.to_string(),
    }
}

/// Error for an identifier that is neither a module nor a class path.
fn missing_entry(entry: &str, kind: ConfigKind, catalog: &Catalog) -> Error {
    let Some((module_path, class_name)) = entry.rsplit_once('.') else {
        return Error::Import(format!("No module named '{entry}'"));
    };
    if !class_name.starts_with(char::is_uppercase) {
        return Error::Import(format!("No module named '{entry}'"));
    }
    let Some(module) = catalog.module(module_path) else {
        return Error::Import(format!("No module named '{module_path}'"));
    };
    let candidates: Vec<String> = module
        .config_classes(kind)
        .into_iter()
        .map(|c| format!("'{}'", c.class_name()))
        .collect();
    let mut message = format!("Module '{module_path}' does not contain a '{class_name}' class.");
    if !candidates.is_empty() {
        message.push_str(&format!(" Choices are: {}.", candidates.join(", ")));
    }
    Error::Import(message)
}
