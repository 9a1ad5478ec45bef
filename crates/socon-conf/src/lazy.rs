//! Lazily resolved settings handle

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;

use crate::settings::is_setting_name;
use crate::{
    Error, Result, Settings, SettingsModule, SettingsWrapper, UserSettingsHolder, global_settings,
};

/// Environment variable naming the user settings module.
pub const ENVIRONMENT_VARIABLE: &str = "SOCON_SETTINGS_MODULE";

/// Resolves environment variables and settings modules on first access.
pub trait SettingsLoader {
    /// Read an environment variable.
    fn env_var(&self, name: &str) -> Option<String>;

    /// Load a settings module by name.
    fn load_settings_module(&self, name: &str) -> Result<SettingsModule>;
}

/// Where a [`LazySettings`] finds its module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// The module named by [`ENVIRONMENT_VARIABLE`], layered over the
    /// framework defaults.
    Environment,
    /// A fixed module, without defaults.
    Module(String),
}

/// A settings handle resolved once, on first access.
///
/// The handle is either resolved from its [`SettingsSource`], configured
/// manually with [`LazySettings::configure`], or replaced wholesale by an
/// override. Once resolved it stays resolved until [`LazySettings::take`].
#[derive(Debug)]
pub struct LazySettings {
    source: SettingsSource,
    wrapped: OnceCell<SettingsWrapper>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Settings resolved from the environment.
    pub fn new() -> Self {
        Self {
            source: SettingsSource::Environment,
            wrapped: OnceCell::new(),
        }
    }

    /// Settings resolved from a fixed module.
    pub fn for_module(name: impl Into<String>) -> Self {
        Self {
            source: SettingsSource::Module(name.into()),
            wrapped: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &SettingsSource {
        &self.source
    }

    /// Whether the settings have been resolved or configured.
    pub fn configured(&self) -> bool {
        self.wrapped.get().is_some()
    }

    /// Resolve the settings if needed and return the wrapper.
    pub fn wrapped(&self, loader: &dyn SettingsLoader) -> Result<&SettingsWrapper> {
        self.setup(loader, None)
    }

    fn setup(&self, loader: &dyn SettingsLoader, name: Option<&str>) -> Result<&SettingsWrapper> {
        self.wrapped.get_or_try_init(|| {
            let wrapper = match &self.source {
                SettingsSource::Environment => {
                    let module = loader
                        .env_var(ENVIRONMENT_VARIABLE)
                        .filter(|m| !m.is_empty())
                        .ok_or_else(|| not_configured(name))?;
                    let mut settings = Settings::new(module.as_str());
                    settings.add_settings(&global_settings(), false);
                    settings.add_settings(&loader.load_settings_module(&module)?, true);
                    settings
                }
                SettingsSource::Module(module) => {
                    let mut settings = Settings::new(module.as_str());
                    settings.add_settings(&loader.load_settings_module(module)?, true);
                    settings
                }
            };
            tracing::debug!(module = wrapper.settings_module(), "settings resolved");
            Ok(SettingsWrapper::Settings(wrapper))
        })
    }

    /// Read a setting.
    pub fn get(&self, loader: &dyn SettingsLoader, name: &str) -> Result<&toml::Value> {
        self.setup(loader, Some(name))?
            .get(name)
            .ok_or_else(|| Error::SettingNotFound(name.to_string()))
    }

    /// Read a setting and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, loader: &dyn SettingsLoader, name: &str) -> Result<T> {
        self.get(loader, name)?
            .clone()
            .try_into()
            .map_err(|source| Error::InvalidValue {
                name: name.to_string(),
                source,
            })
    }

    /// Configure the settings by hand, layering `overrides` over `defaults`.
    pub fn configure<I, K>(&mut self, defaults: SettingsModule, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, toml::Value)>,
        K: Into<String>,
    {
        if self.configured() {
            return Err(Error::AlreadyConfigured);
        }
        let mut base = Settings::new(defaults.name());
        base.add_settings(&defaults, false);
        let mut holder = UserSettingsHolder::new(Some(SettingsWrapper::Settings(base)));
        for (name, value) in overrides {
            let name = name.into();
            if !is_setting_name(&name) {
                return Err(Error::NotUppercase(name));
            }
            holder.set(name, value);
        }
        self.replace(Some(SettingsWrapper::Holder(holder)));
        Ok(())
    }

    /// Set a setting, resolving the settings first if needed.
    pub fn set(
        &mut self,
        loader: &dyn SettingsLoader,
        name: impl Into<String>,
        value: toml::Value,
    ) -> Result<()> {
        self.setup(loader, None)?;
        if let Some(wrapped) = self.wrapped.get_mut() {
            wrapped.set(name, value);
        }
        Ok(())
    }

    /// Delete a setting, resolving the settings first if needed.
    pub fn delete(&mut self, loader: &dyn SettingsLoader, name: &str) -> Result<()> {
        self.setup(loader, None)?;
        match self.wrapped.get_mut() {
            Some(wrapped) => wrapped.delete(name),
            None => Err(Error::SettingNotFound(name.to_string())),
        }
    }

    pub fn is_overridden(&self, loader: &dyn SettingsLoader, name: &str) -> Result<bool> {
        Ok(self.setup(loader, None)?.is_overridden(name))
    }

    /// Sorted names of every visible setting.
    pub fn names(&self, loader: &dyn SettingsLoader) -> Result<Vec<String>> {
        Ok(self.setup(loader, None)?.names())
    }

    /// The container name: first dotted component of the settings module.
    ///
    /// `None` when the settings are not configured, no module is named, or
    /// the module is a TOML file.
    pub fn settings_module_name(&self, loader: &dyn SettingsLoader) -> Option<String> {
        if !self.configured() {
            return None;
        }
        let module = match &self.source {
            SettingsSource::Environment => loader.env_var(ENVIRONMENT_VARIABLE)?,
            SettingsSource::Module(module) => module.clone(),
        };
        if module.is_empty() || module.ends_with(".toml") {
            return None;
        }
        module.split('.').next().map(str::to_string)
    }

    /// Remove the current wrapper, leaving the settings unresolved.
    pub fn take(&mut self) -> Option<SettingsWrapper> {
        self.wrapped.take()
    }

    /// Install `wrapper` as the resolved settings (or clear them with `None`).
    pub fn replace(&mut self, wrapper: Option<SettingsWrapper>) {
        self.wrapped = match wrapper {
            Some(wrapper) => OnceCell::with_value(wrapper),
            None => OnceCell::new(),
        };
    }
}

fn not_configured(name: Option<&str>) -> Error {
    let desc = match name {
        Some(name) => format!("setting {name}"),
        None => "settings".to_string(),
    };
    Error::ImproperlyConfigured(format!(
        "Requested {desc}, but settings are not configured. You must either define \
         the environment variable {ENVIRONMENT_VARIABLE} or call settings.configure() \
         before accessing settings."
    ))
}
