//! Error types for socon-core

/// Result type for socon-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by registries, managers and hook registration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid registry, manager or hook declaration
    #[error("{0}")]
    ImproperlyConfigured(String),

    /// A registry was queried before being populated
    #[error("{0}")]
    RegistryNotReady(String),

    /// No configuration with the requested label
    #[error("{0}")]
    Lookup(String),

    /// A module or attribute could not be resolved
    #[error("{0}")]
    Import(String),

    /// No manager with the requested name
    #[error("{0}")]
    ManagerNotFound(String),

    /// A manager was queried before any hook was registered
    #[error("{0}")]
    ManagerNotHooked(String),

    /// No hook with the requested name in any searched configuration
    #[error("{0}")]
    HookNotFound(String),

    /// A hook was declared outside every registered configuration
    #[error("{0}")]
    UnownedHook(String),

    /// A project setting is missing
    #[error("{name} setting does not exist in {label} project")]
    MissingSetting { name: String, label: String },

    /// Settings error from socon-conf
    #[error(transparent)]
    Settings(socon_conf::Error),
}

impl From<socon_conf::Error> for Error {
    fn from(err: socon_conf::Error) -> Self {
        match err {
            socon_conf::Error::ImproperlyConfigured(msg) => Error::ImproperlyConfigured(msg),
            socon_conf::Error::Import(msg) => Error::Import(msg),
            other => Error::Settings(other),
        }
    }
}
