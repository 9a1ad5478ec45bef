//! The three registries of a process

use std::sync::Arc;

use super::{BaseRegistry, Configuration, RegistryKind};
use crate::{Error, Result};

/// Label of the framework's own configuration.
pub const SOCON_CONFIG_LABEL: &str = "core";

/// Common, plugin and project registries.
#[derive(Debug)]
pub struct CoreRegistry {
    common: BaseRegistry,
    plugins: BaseRegistry,
    projects: BaseRegistry,
}

impl Default for CoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreRegistry {
    pub fn new() -> Self {
        Self {
            common: BaseRegistry::new(RegistryKind::Common),
            plugins: BaseRegistry::new(RegistryKind::Plugins),
            projects: BaseRegistry::new(RegistryKind::Projects),
        }
    }

    pub fn get(&self, kind: RegistryKind) -> &BaseRegistry {
        match kind {
            RegistryKind::Common => &self.common,
            RegistryKind::Plugins => &self.plugins,
            RegistryKind::Projects => &self.projects,
        }
    }

    pub fn get_mut(&mut self, kind: RegistryKind) -> &mut BaseRegistry {
        match kind {
            RegistryKind::Common => &mut self.common,
            RegistryKind::Plugins => &mut self.plugins,
            RegistryKind::Projects => &mut self.projects,
        }
    }

    pub fn common(&self) -> &BaseRegistry {
        &self.common
    }

    pub fn plugins(&self) -> &BaseRegistry {
        &self.plugins
    }

    pub fn projects(&self) -> &BaseRegistry {
        &self.projects
    }

    /// The most specific configuration containing `object_name`, searched in
    /// every populated registry.
    pub fn get_containing_registry_config(
        &self,
        object_name: &str,
    ) -> Option<Arc<Configuration>> {
        RegistryKind::by_importance_order()
            .into_iter()
            .map(|kind| self.get(kind))
            .filter(|registry| registry.registry_ready())
            .filter_map(|registry| registry.get_containing_registry_config(object_name).ok().flatten())
            .max_by_key(|config| config.name().len())
    }

    /// The framework's own configuration.
    pub fn get_socon_common_config(&self) -> Result<Arc<Configuration>> {
        self.common.get_registry_config(SOCON_CONFIG_LABEL)
    }

    /// Project configurations followed by plugin configurations.
    pub fn get_user_configs(&self) -> Result<Vec<Arc<Configuration>>> {
        let mut configs = self.projects.get_registry_configs()?.to_vec();
        configs.extend_from_slice(self.plugins.get_registry_configs()?);
        Ok(configs)
    }

    /// The project selected by `active`, the value of the active project
    /// variable.
    pub fn project_config_by_env(&self, active: Option<&str>) -> Result<Arc<Configuration>> {
        match active {
            Some(label) if !label.is_empty() => self.projects.get_registry_config(label),
            _ => {
                let labels = self.projects.labels()?;
                Err(Error::Lookup(format!(
                    "Cannot autodetect any project. You can find below the list of the \
                     available projects:\n{}",
                    quoted_list(&labels)
                )))
            }
        }
    }
}

/// Render labels as `['a', 'b']`.
pub fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}
