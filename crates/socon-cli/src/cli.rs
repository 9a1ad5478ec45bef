//! Options shared by every command, and the tolerant pre-parse the utility
//! runs before any command is known.

use clap::Args;
use socon_core::{ACTIVE_PROJECT_VARIABLE, Environ};

/// Environment variable naming the settings module.
pub const SETTINGS_VARIABLE: &str = socon_conf::ENVIRONMENT_VARIABLE;

/// Options accepted by every command.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultOptions {
    /// The settings module, e.g. "myproject.settings" or a path to a TOML
    /// file. If this isn't provided, the SOCON_SETTINGS_MODULE environment
    /// variable will be used.
    #[arg(long)]
    pub settings: Option<String>,

    /// The project label of the command you want to start. Mandatory for
    /// project commands unless SOCON_ACTIVE_PROJECT is set.
    #[arg(long)]
    pub project: Option<String>,

    /// Return CommandError failures instead of printing them
    #[arg(long)]
    pub traceback: bool,

    /// Verbosity level; 0=minimal output, 1=normal output, 2=verbose output,
    /// 3=very verbose output
    #[arg(
        short = 'v',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    pub verbosity: u8,
}

impl DefaultOptions {
    /// Write `--settings` and `--project` into the environment snapshot.
    pub fn apply(&self, env: &mut Environ) {
        if let Some(settings) = self.settings.as_deref().filter(|s| !s.is_empty()) {
            env.set(SETTINGS_VARIABLE, settings);
        }
        if let Some(project) = self.project.as_deref().filter(|p| !p.is_empty()) {
            env.set(ACTIVE_PROJECT_VARIABLE, project);
        }
    }
}

/// Result of [`preparse`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Preparsed {
    pub options: DefaultOptions,
    /// Positional arguments, in order.
    pub args: Vec<String>,
}

/// Extract `--settings` and `--project` from `args`, ignoring every other
/// option. Never fails: a trailing option without a value is dropped.
pub fn preparse<S: AsRef<str>>(args: &[S]) -> Preparsed {
    let mut parsed = Preparsed::default();
    let mut iter = args.iter().map(AsRef::as_ref);
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value)),
            _ => (arg, None),
        };
        let slot = match flag {
            "--settings" => &mut parsed.options.settings,
            "--project" => &mut parsed.options.project,
            _ => {
                if !arg.starts_with('-') {
                    parsed.args.push(arg.to_string());
                }
                continue;
            }
        };
        let value = match inline {
            Some(value) => Some(value),
            None => iter.next(),
        };
        if let Some(value) = value {
            *slot = Some(value.to_string());
        }
    }
    parsed
}
