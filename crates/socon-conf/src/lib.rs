//! Settings layer for the socon framework
//!
//! Settings are read from a *settings module*: a namespace of upper-case
//! identifiers mapped to TOML values. The process-wide handle,
//! [`LazySettings`], resolves its module on first access, layers it over
//! the framework defaults in [`global_settings`] and keeps track of which
//! keys were explicitly set.
//!
//! ```text
//!   SOCON_SETTINGS_MODULE ──► SettingsLoader ──► SettingsModule
//!                                                     │
//!   global_settings() ─────────────────────────► Settings (explicit keys tracked)
//!                                                     │
//!   configure() / override ──► UserSettingsHolder ──► SettingsWrapper
//! ```
//!
//! Module resolution is delegated to a [`SettingsLoader`], so this crate has
//! no opinion on where modules come from.

pub mod error;
pub mod global_settings;
pub mod lazy;
pub mod module;
pub mod settings;

pub use error::{Error, Result};
pub use global_settings::global_settings;
pub use lazy::{ENVIRONMENT_VARIABLE, LazySettings, SettingsLoader, SettingsSource};
pub use module::{SettingEntry, SettingsModule};
pub use settings::{Settings, SettingsWrapper, UserSettingsHolder, is_setting_name};
