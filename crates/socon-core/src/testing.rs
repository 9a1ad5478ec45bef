//! Temporary settings overrides for tests

use std::ops::{Deref, DerefMut};

use socon_conf::global_settings::{
    INSTALLED_PLUGINS, INSTALLED_PROJECTS, SKIP_ERROR_ON_PROJECTS_IMPORT,
};
use socon_conf::{SettingsWrapper, UserSettingsHolder};

use crate::registry::RegistryKind;
use crate::{Error, Result, Socon};

/// Settings to layer over the current ones for the lifetime of an
/// [`OverrideGuard`].
#[derive(Debug, Clone, Default)]
pub struct OverrideSettings {
    values: Vec<(String, toml::Value)>,
}

impl OverrideSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((name, value)),
        }
        self
    }

    pub fn installed_projects<I, S>(self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(INSTALLED_PROJECTS, string_array(projects))
    }

    pub fn installed_plugins<I, S>(self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(INSTALLED_PLUGINS, string_array(plugins))
    }

    fn get(&self, name: &str) -> Option<&toml::Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn list(&self, name: &str) -> Result<Option<Vec<String>>> {
        self.get(name)
            .map(|value| {
                value.clone().try_into().map_err(|_| {
                    Error::ImproperlyConfigured(format!("{name} must be a list of strings"))
                })
            })
            .transpose()
    }
}

fn string_array<I, S>(items: I) -> toml::Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    toml::Value::Array(
        items
            .into_iter()
            .map(|item| toml::Value::String(item.into()))
            .collect(),
    )
}

/// Restores the settings and registries on drop.
///
/// Dereferences to the [`Socon`] handle, so overrides nest and unwind in
/// reverse order.
#[derive(Debug)]
pub struct OverrideGuard<'a> {
    socon: &'a mut Socon,
    projects: bool,
    plugins: bool,
}

impl Deref for OverrideGuard<'_> {
    type Target = Socon;

    fn deref(&self) -> &Socon {
        self.socon
    }
}

impl DerefMut for OverrideGuard<'_> {
    fn deref_mut(&mut self) -> &mut Socon {
        self.socon
    }
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        if self.projects {
            self.socon.unset_installed_configs(RegistryKind::Projects);
        }
        if self.plugins {
            self.socon.unset_installed_configs(RegistryKind::Plugins);
        }
        let previous = match self.socon.settings_mut().take() {
            Some(SettingsWrapper::Holder(holder)) => holder.into_defaults(),
            other => other,
        };
        self.socon.settings_mut().replace(previous);
        tracing::debug!("settings override disabled");
    }
}

impl Socon {
    /// Layer `options` over the current settings until the returned guard
    /// is dropped.
    ///
    /// `INSTALLED_PROJECTS` and `INSTALLED_PLUGINS` also replace the
    /// matching registry. When that fails, every registry change is undone
    /// before the error is returned.
    pub fn override_settings(&mut self, options: OverrideSettings) -> Result<OverrideGuard<'_>> {
        let projects = options.list(INSTALLED_PROJECTS)?;
        let plugins = options.list(INSTALLED_PLUGINS)?;

        if let Some(projects) = &projects {
            let skip = match options.get(SKIP_ERROR_ON_PROJECTS_IMPORT) {
                Some(value) => value.as_bool().ok_or_else(|| {
                    Error::ImproperlyConfigured(format!(
                        "{SKIP_ERROR_ON_PROJECTS_IMPORT} must be a boolean"
                    ))
                })?,
                None => self.setting_as(SKIP_ERROR_ON_PROJECTS_IMPORT)?,
            };
            if let Err(err) =
                self.set_installed_configs(RegistryKind::Projects, projects.clone(), skip)
            {
                self.unset_installed_configs(RegistryKind::Projects);
                return Err(err);
            }
        }
        if let Some(plugins) = &plugins {
            if let Err(err) =
                self.set_installed_configs(RegistryKind::Plugins, plugins.clone(), false)
            {
                self.unset_installed_configs(RegistryKind::Plugins);
                if projects.is_some() {
                    self.unset_installed_configs(RegistryKind::Projects);
                }
                return Err(err);
            }
        }

        if let Err(err) = self.settings().wrapped(&self.loader()) {
            tracing::debug!(error = %err, "overriding unresolved settings");
        }
        let mut holder = UserSettingsHolder::new(self.settings_mut().take());
        for (name, value) in options.values {
            holder.set(name, value);
        }
        self.settings_mut().replace(Some(SettingsWrapper::Holder(holder)));
        tracing::debug!("settings override enabled");

        Ok(OverrideGuard {
            socon: self,
            projects: projects.is_some(),
            plugins: plugins.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::Environ;
    use crate::loader::{Catalog, ModuleDef};
    use pretty_assertions::assert_eq;

    fn socon() -> Socon {
        let catalog = Catalog::new()
            .with(ModuleDef::new("site").path("/srv/site"))
            .with(ModuleDef::new("site.blog"))
            .with(ModuleDef::new("site.shop"));
        let mut socon = Socon::with_env(catalog, Environ::new()).unwrap();
        socon
            .configure([
                (INSTALLED_PROJECTS, toml::Value::from(vec!["site.blog"])),
                ("LOGGING_CONFIG", toml::Value::from("")),
            ])
            .unwrap();
        socon.setup().unwrap();
        socon
    }

    fn labels(socon: &Socon) -> Vec<String> {
        socon.registry().projects().labels().unwrap()
    }

    #[test]
    fn test_override_value_and_restore() {
        let mut socon = socon();
        {
            let guard = socon
                .override_settings(OverrideSettings::new().set("FOO", "bar"))
                .unwrap();
            assert_eq!(guard.setting("FOO").unwrap(), toml::Value::from("bar"));
            assert!(guard.settings().is_overridden(&guard.loader(), "FOO").unwrap());
        }
        assert!(socon.setting("FOO").is_err());
        assert_eq!(labels(&socon), vec!["blog"]);
    }

    #[test]
    fn test_override_installed_projects_round_trip() {
        let mut socon = socon();
        let before = labels(&socon);
        {
            let guard = socon
                .override_settings(OverrideSettings::new().installed_projects(["site.shop"]))
                .unwrap();
            assert_eq!(labels(&guard), vec!["shop"]);
            let projects: Vec<String> = guard.setting_as(INSTALLED_PROJECTS).unwrap();
            assert_eq!(projects, vec!["site.shop"]);
        }
        assert_eq!(labels(&socon), before);
        assert_eq!(socon.registry().projects().stored_depth(), 0);
    }

    #[test]
    fn test_nested_overrides_unwind_in_order() {
        let mut socon = socon();
        {
            let mut outer = socon
                .override_settings(OverrideSettings::new().installed_projects(["site.shop"]))
                .unwrap();
            {
                let inner = outer
                    .override_settings(
                        OverrideSettings::new().installed_projects(["site.shop", "site.blog"]),
                    )
                    .unwrap();
                assert_eq!(labels(&inner), vec!["shop", "blog"]);
            }
            assert_eq!(labels(&outer), vec!["shop"]);
        }
        assert_eq!(labels(&socon), vec!["blog"]);
    }

    #[test]
    fn test_failed_override_rolls_back() {
        let mut socon = socon();
        let err = socon
            .override_settings(
                OverrideSettings::new()
                    .installed_projects(["site.shop"])
                    .installed_plugins(["no.such.plugin"]),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "No module named 'no.such.plugin'");
        assert_eq!(labels(&socon), vec!["blog"]);
        assert_eq!(socon.registry().projects().stored_depth(), 0);
        assert_eq!(socon.registry().plugins().stored_depth(), 0);
        assert!(socon.setting("INSTALLED_PLUGINS").is_ok());
    }

    #[test]
    fn test_strict_project_override_fails() {
        let mut socon = socon();
        let result = socon.override_settings(
            OverrideSettings::new()
                .installed_projects(["missing"])
                .set(SKIP_ERROR_ON_PROJECTS_IMPORT, false),
        );
        assert!(result.is_err());
        drop(result);
        assert_eq!(labels(&socon), vec!["blog"]);
    }

    #[test]
    fn test_invalid_project_list() {
        let mut socon = socon();
        let err = socon
            .override_settings(OverrideSettings::new().set(INSTALLED_PROJECTS, "site.blog"))
            .unwrap_err();
        assert_eq!(err.to_string(), "INSTALLED_PROJECTS must be a list of strings");
    }
}
