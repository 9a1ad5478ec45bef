//! Error types for socon-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// A user-facing command failure.
///
/// Printed as `CommandError: <message>` by the command-line utility, which
/// then exits with `returncode`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
    returncode: i32,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            returncode: 1,
        }
    }

    pub fn with_returncode(mut self, returncode: i32) -> Self {
        self.returncode = returncode;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn returncode(&self) -> i32 {
        self.returncode
    }
}

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from socon-core
    #[error(transparent)]
    Core(#[from] socon_core::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A command failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// No command with the requested name is reachable
    #[error("{0}")]
    CommandNotFound(String),
}

impl From<socon_conf::Error> for CliError {
    fn from(err: socon_conf::Error) -> Self {
        Self::Core(err.into())
    }
}
