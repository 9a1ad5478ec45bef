//! Configurations and the registries holding them

mod base;
mod config;
mod core;

pub use self::base::{BaseRegistry, RegistryEntry, RegistryState};
pub use self::config::{
    ConfigClass, ConfigKind, Configuration, DEFAULT_PROJECT_SETTINGS_MODULE, MANAGER_MODULE_NAME,
    RegistryKind,
};
pub use self::core::{CoreRegistry, SOCON_CONFIG_LABEL, quoted_list};
