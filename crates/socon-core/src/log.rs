//! Logging configuration
//!
//! `LOGGING_CONFIG` names a callable in the module catalog and `LOGGING`
//! is the payload handed to it. The framework ships
//! [`FMT_SUBSCRIBER`], which installs a `tracing-subscriber` fmt layer.

use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::loader::{Attr, Catalog, ModuleDef};
use crate::{Error, Result};

/// Root module of the framework.
pub const SOCON_MODULE: &str = "socon";

/// Module of the framework's own configuration.
pub const SOCON_CORE_MODULE: &str = "socon.core";

/// Default logging configurator.
pub const FMT_SUBSCRIBER: &str = "socon.utils.log.fmt_subscriber";

/// Options read from the `LOGGING` payload by [`fmt_subscriber`].
#[derive(Debug, Deserialize)]
struct FmtOptions {
    /// Filter directives, e.g. `socon_core=debug,warn`.
    #[serde(default)]
    filter: Option<String>,
    /// Shorthand for a single level directive.
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    target: bool,
    #[serde(default = "default_ansi")]
    ansi: bool,
}

fn default_ansi() -> bool {
    true
}

/// Run the configurator at `path` with `payload`.
///
/// Nothing happens when `path` is empty. The configurator must resolve to a
/// callable; it is only invoked with a non-empty payload.
pub fn configure_logging(catalog: &Catalog, path: &str, payload: &toml::Value) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    let configurator = match catalog.import_string(path)? {
        Attr::Callable(f) => Arc::clone(f),
        _ => {
            return Err(Error::ImproperlyConfigured(format!(
                "LOGGING_CONFIG '{path}' is not a callable"
            )));
        }
    };
    if is_empty_payload(payload) {
        return Ok(());
    }
    tracing::debug!(configurator = path, "configuring logging");
    configurator(payload)
}

fn is_empty_payload(payload: &toml::Value) -> bool {
    match payload {
        toml::Value::Table(table) => table.is_empty(),
        toml::Value::Array(items) => items.is_empty(),
        toml::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Install a global fmt subscriber configured from `payload`.
///
/// An already installed subscriber is left in place.
pub fn fmt_subscriber(payload: &toml::Value) -> Result<()> {
    let options: FmtOptions = payload.clone().try_into().map_err(|e| {
        Error::ImproperlyConfigured(format!("Invalid LOGGING settings: {e}"))
    })?;
    let directives = options
        .filter
        .or(options.level)
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&directives).map_err(|e| {
        Error::ImproperlyConfigured(format!("Invalid logging filter '{directives}': {e}"))
    })?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(options.target)
        .with_ansi(options.ansi)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = installed {
        tracing::debug!(error = %e, "subscriber already installed");
    }
    Ok(())
}

/// Modules every process knows about: the framework core configuration,
/// the global settings and the logging utilities.
pub fn core_catalog() -> Catalog {
    Catalog::new()
        .with(ModuleDef::new(SOCON_MODULE).path(env!("CARGO_MANIFEST_DIR")))
        .with(ModuleDef::new(SOCON_CORE_MODULE))
        .with(ModuleDef::new(socon_conf::global_settings::GLOBAL_SETTINGS_MODULE))
        .with(ModuleDef::new("socon.utils.log").callable("fmt_subscriber", fmt_subscriber))
}
