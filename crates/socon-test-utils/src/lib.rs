//! Shared test fixtures for the socon workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`catalog`]: fixture modules (container, projects, managers, hooks)
//! - [`handle`]: [`TestSocon`] builder and TOML [`SettingsFile`]s

pub mod catalog;
pub mod handle;

pub use catalog::{
    DEFAULT_MANAGER, Greeter, INSTALLED_PROJECTS, SETTINGS_MODULE, fixture_catalog, fixtures_root,
};
pub use handle::{SETTINGS_VARIABLE, SettingsFile, TestSocon};
