//! Framework defaults, layered beneath every user settings module.

use crate::SettingsModule;

/// Dotted name of the defaults module.
pub const GLOBAL_SETTINGS_MODULE: &str = "socon.conf.global_settings";

/// Identifiers of installed plugins.
pub const INSTALLED_PLUGINS: &str = "INSTALLED_PLUGINS";

/// Identifiers of installed projects.
pub const INSTALLED_PROJECTS: &str = "INSTALLED_PROJECTS";

/// Collect project import errors instead of aborting.
pub const SKIP_ERROR_ON_PROJECTS_IMPORT: &str = "SKIP_ERROR_ON_PROJECTS_IMPORT";

/// Dotted path of the logging configurator callable.
pub const LOGGING_CONFIG: &str = "LOGGING_CONFIG";

/// Payload handed to the logging configurator.
pub const LOGGING: &str = "LOGGING";

/// The configurator installed by default.
pub const DEFAULT_LOGGING_CONFIG: &str = "socon.utils.log.fmt_subscriber";

/// Build the defaults module.
pub fn global_settings() -> SettingsModule {
    SettingsModule::new(GLOBAL_SETTINGS_MODULE)
        .with_value(INSTALLED_PLUGINS, toml::Value::Array(Vec::new()))
        .with_value(INSTALLED_PROJECTS, toml::Value::Array(Vec::new()))
        // Projects should not break each other on import.
        .with_value(SKIP_ERROR_ON_PROJECTS_IMPORT, true)
        .with_value(LOGGING_CONFIG, DEFAULT_LOGGING_CONFIG)
        .with_value(LOGGING, toml::Value::Table(toml::Table::new()))
}
