//! Registry, manager and hook resolution for the socon framework
//!
//! A [`Socon`] handle holds three registries of [`Configuration`]s:
//!
//! - `common`: the framework's own configuration (label `core`) and the
//!   user's container configuration
//! - `plugins`: `INSTALLED_PLUGINS`
//! - `projects`: `INSTALLED_PROJECTS`
//!
//! Populating a registry imports the `managers` module of every new
//! configuration. Managers then import their lookup modules per
//! configuration and index the hooks declared there.
//!
//! ```text
//!   Catalog ──► Configuration::create ──► BaseRegistry ──► <config>.managers
//!                                                                │
//!   search_hook_impl ◄── Manager (registry, label, name) ◄── <config>.<lookup>
//! ```
//!
//! Hooks are searched in a fixed order: an explicit configuration, then the
//! user's common configuration and the plugins, then the framework.

pub mod environ;
pub mod error;
pub mod loader;
pub mod log;
pub mod manager;
pub mod registry;
pub mod socon;
pub mod testing;

pub use environ::{ACTIVE_PROJECT_VARIABLE, Environ};
pub use error::{Error, Result};
pub use loader::{Attr, Catalog, Declaration, ModuleDef, ModuleScope};
pub use manager::{Hook, HookDef, Manager, ManagerDef, ManagerRegistry, ModuleLookup};
pub use registry::{
    BaseRegistry, ConfigClass, ConfigKind, Configuration, CoreRegistry, RegistryEntry,
    RegistryKind,
};
pub use socon::{ModuleLoader, Socon};
pub use testing::{OverrideGuard, OverrideSettings};
