//! The [`Command`] trait and its argument parser
//!
//! A command is a hook of the `commands` manager (or of a subcommand
//! manager) whose implementation is a [`CommandHook`]. Modules declare them
//! from their init routine:
//!
//! ```rust,no_run
//! use std::io::Write;
//!
//! use socon_cli::{Command, CommandContext, command_hook};
//! use socon_core::ModuleDef;
//!
//! struct HelloCommand;
//!
//! impl Command for HelloCommand {
//!     fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
//!         writeln!(ctx.out(), "hello")?;
//!         Ok(())
//!     }
//! }
//!
//! let module = ModuleDef::new("site.management.commands.hello").init(|scope| {
//!     scope.hook(command_hook(HelloCommand));
//!     Ok(())
//! });
//! ```

use std::any::Any;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Args, FromArgMatches};
use socon_core::{Configuration, HookDef, Socon};

use crate::cli::DefaultOptions;
use crate::error::{CliError, CommandError, Result};
use crate::manager::COMMANDS_MANAGER;

/// Id of the positional collecting unparsed arguments.
pub const EXTRAS_ARGS: &str = "extras_args";

/// Framework version, reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which projects may run a project command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectAccess {
    /// Every installed project.
    All,
    /// The installed projects among these labels.
    Only(Vec<String>),
}

/// General commands run anywhere; project commands need an active project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    General,
    Project(ProjectAccess),
}

impl CommandKind {
    /// `G` or `P`, as shown in usage listings.
    pub fn marker(&self) -> char {
        match self {
            Self::General => 'G',
            Self::Project(_) => 'P',
        }
    }
}

/// A management command.
pub trait Command: Send + Sync {
    /// Description shown in the command help.
    fn help(&self) -> &str {
        ""
    }

    /// Add command-specific arguments to the parser.
    fn add_arguments(&self, parser: clap::Command) -> clap::Command {
        parser
    }

    /// Collect unknown trailing arguments instead of rejecting them.
    fn keep_extras_args(&self) -> bool {
        false
    }

    fn kind(&self) -> CommandKind {
        CommandKind::General
    }

    /// Name of the manager holding this command's subcommands, for command
    /// groups.
    fn subcommand_manager(&self) -> Option<&str> {
        None
    }

    /// Run the command.
    fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<()>;
}

/// Hook payload of every command.
#[derive(Clone)]
pub struct CommandHook(Arc<dyn Command>);

impl CommandHook {
    pub fn new<C: Command + 'static>(command: C) -> Self {
        Self(Arc::new(command))
    }

    pub fn command(&self) -> Arc<dyn Command> {
        Arc::clone(&self.0)
    }
}

impl fmt::Debug for CommandHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandHook").field(&self.0.kind()).finish()
    }
}

/// Declare `command` as a hook of the `commands` manager, named after its
/// type. Use [`HookDef::name`] and [`HookDef::manager`] to change either.
pub fn command_hook<C: Command + 'static>(command: C) -> HookDef {
    let type_name = short_type_name::<C>();
    let name = command_name(type_name);
    HookDef::new(type_name, CommandHook::new(command))
        .name(name)
        .manager(COMMANDS_MANAGER)
}

/// The command name derived from a type name: the last `Command` removed,
/// lower-cased.
pub fn command_name(type_name: &str) -> String {
    let name = match type_name.rfind("Command") {
        Some(at) => format!("{}{}", &type_name[..at], &type_name[at + "Command".len()..]),
        None => type_name.to_string(),
    };
    name.to_lowercase()
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Build the parser of `command`, invoked as `<prog_name> <subcommand>`.
pub fn create_parser(command: &dyn Command, prog_name: &str, subcommand: &str) -> clap::Command {
    let prog = Path::new(prog_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parser = clap::Command::new(subcommand.to_string())
        .bin_name(format!("{prog} {subcommand}").trim().to_string())
        .no_binary_name(true)
        .version(VERSION)
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .long("version")
                .action(ArgAction::Version)
                .help("Print version"),
        );
    if !command.help().is_empty() {
        parser = parser.about(command.help().to_string());
    }
    let mut parser = DefaultOptions::augment_args(command.add_arguments(parser));
    if command.keep_extras_args() {
        parser = parser.arg(
            Arg::new(EXTRAS_ARGS)
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .hide(true),
        );
    }
    parser
}

/// Parsed arguments of one invocation.
#[derive(Debug, Clone)]
pub struct Options {
    pub matches: ArgMatches,
    pub defaults: DefaultOptions,
    pub extras_args: Vec<String>,
}

/// Parse `args` with the parser of `command`.
pub fn parse_options<I, S>(
    command: &dyn Command,
    parser: clap::Command,
    args: I,
) -> std::result::Result<Options, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let matches = parser.try_get_matches_from(args.into_iter().map(Into::into))?;
    let defaults = DefaultOptions::from_arg_matches(&matches)?;
    let extras_args = if command.keep_extras_args() {
        matches
            .get_many::<String>(EXTRAS_ARGS)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    Ok(Options {
        matches,
        defaults,
        extras_args,
    })
}

/// A parse error as a [`CommandError`], for programmatic invocations.
pub fn parse_error(err: &clap::Error) -> CommandError {
    let rendered = err.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    CommandError::new(format!(
        "Error: {}",
        first.strip_prefix("error: ").unwrap_or(first)
    ))
}

/// Everything a running command can reach.
pub struct CommandContext<'a> {
    socon: &'a mut Socon,
    options: Options,
    project: Option<Arc<Configuration>>,
    out: &'a mut dyn Write,
}

impl<'a> CommandContext<'a> {
    pub fn new(socon: &'a mut Socon, options: Options, out: &'a mut dyn Write) -> Self {
        Self {
            socon,
            options,
            project: None,
            out,
        }
    }

    pub fn socon(&self) -> &Socon {
        self.socon
    }

    pub fn socon_mut(&mut self) -> &mut Socon {
        self.socon
    }

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    pub fn matches(&self) -> &ArgMatches {
        &self.options.matches
    }

    pub fn default_options(&self) -> &DefaultOptions {
        &self.options.defaults
    }

    /// Unparsed trailing arguments, for commands keeping them.
    pub fn extras_args(&self) -> &[String] {
        &self.options.extras_args
    }

    /// The value of option `name`, `None` when absent or not declared.
    pub fn get_option<T: Any + Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        self.options
            .matches
            .try_get_one::<T>(name)
            .ok()
            .flatten()
            .cloned()
    }

    pub fn get_flag(&self, name: &str) -> bool {
        self.get_option::<bool>(name).unwrap_or(false)
    }

    /// The active project, for project commands.
    pub fn project(&self) -> Option<&Arc<Configuration>> {
        self.project.as_ref()
    }
}

/// Run `command`, checking project access first for project commands.
pub fn execute(command: &dyn Command, ctx: &mut CommandContext<'_>) -> Result<()> {
    if let CommandKind::Project(access) = command.kind() {
        let project = ctx.socon.project_config_by_env()?;
        let available = ctx.socon.project_labels()?;
        let authorized: Vec<String> = match access {
            ProjectAccess::All => available,
            ProjectAccess::Only(allowed) => available
                .into_iter()
                .filter(|label| allowed.contains(label))
                .collect(),
        };
        if !authorized.iter().any(|label| label == project.label()) {
            return Err(CliError::Command(CommandError::new(format!(
                "'{}' project does not have access to this command.\n\
                 List of authorized projects:\n{}",
                project.label(),
                authorized.join("\n")
            ))));
        }
        tracing::debug!(project = project.label(), "project command authorized");
        ctx.project = Some(project);
    }
    command.handle(ctx)
}
