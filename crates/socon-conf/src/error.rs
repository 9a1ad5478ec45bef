//! Error types for socon-conf

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving or mutating settings
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings cannot be resolved (no module configured, bad value shape)
    #[error("{0}")]
    ImproperlyConfigured(String),

    /// A settings module could not be found
    #[error("{0}")]
    Import(String),

    /// `configure()` called on settings that are already resolved
    #[error("Settings already configured.")]
    AlreadyConfigured,

    /// A non upper-case key was passed to `configure()`
    #[error("Setting '{0}' must be uppercase.")]
    NotUppercase(String),

    /// The requested setting is not defined
    #[error("'Settings' object has no attribute '{0}'")]
    SettingNotFound(String),

    /// A setting exists but does not have the requested shape
    #[error("Invalid value for setting {name}: {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
