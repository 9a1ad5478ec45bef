//! Command-line dispatch
//!
//! [`ManagementUtility`] turns an argv into a command run:
//!
//! 1. pre-parse `--settings` / `--project` into the environment snapshot
//! 2. touch `INSTALLED_PROJECTS`, keeping any settings error for the help
//! 3. run setup when the settings resolved
//! 4. dispatch `help`, `version` or a command found in the `commands`
//!    manager, honoring the active project
//!
//! Output goes to the [`Streams`] handed in, and the process exit code is
//! returned rather than applied, so callers decide how to exit.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use similar::get_close_matches;
use socon_conf::global_settings::INSTALLED_PROJECTS;
use socon_core::{ACTIVE_PROJECT_VARIABLE, Catalog, Environ, Error as CoreError, Socon};

use crate::catalog;
use crate::cli::{SETTINGS_VARIABLE, preparse};
use crate::command::{
    Command, CommandContext, Options, VERSION, create_parser, execute, parse_error,
    parse_options,
};
use crate::error::{CliError, CommandError, Result};
use crate::manager::{COMMANDS_MANAGER, commands_usage, get_commands, search_command, separator};

/// Output and error streams of one run.
pub struct Streams<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> Streams<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }
}

/// The `socon` command-line utility.
pub struct ManagementUtility {
    argv: Vec<String>,
    prog_name: String,
    socon: Socon,
    settings_exception: Option<CoreError>,
}

impl ManagementUtility {
    /// A utility over the process environment. `modules` are registered
    /// next to the framework's own.
    pub fn new(argv: Vec<String>, modules: Catalog) -> Result<Self> {
        Self::with_env(argv, modules, Environ::from_process())
    }

    pub fn with_env(argv: Vec<String>, modules: Catalog, env: Environ) -> Result<Self> {
        let mut all = catalog();
        all.merge(modules);
        let prog_name = argv
            .first()
            .and_then(|arg0| Path::new(arg0).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "socon".to_string());
        Ok(Self {
            argv,
            prog_name,
            socon: Socon::with_env(all, env)?,
            settings_exception: None,
        })
    }

    pub fn prog_name(&self) -> &str {
        &self.prog_name
    }

    pub fn socon(&self) -> &Socon {
        &self.socon
    }

    /// Run the command named by argv and return the exit code.
    pub fn execute(&mut self, streams: &mut Streams<'_>) -> Result<i32> {
        let subcommand = self
            .argv
            .get(1)
            .cloned()
            .unwrap_or_else(|| "help".to_string());

        let preparsed = preparse(self.argv.get(2..).unwrap_or_default());
        preparsed.options.apply(self.socon.env_mut());

        if let Err(err) = self.socon.setting(INSTALLED_PROJECTS) {
            tracing::debug!(error = %err, "settings unavailable");
            self.settings_exception = Some(err);
        }
        if self.socon.settings_configured() {
            self.socon.setup()?;
        }

        let rest = self.argv.get(1..).unwrap_or_default();
        let version_flag = rest == ["--version"];
        let help_flag = rest == ["--help"] || rest == ["-h"];

        match subcommand.as_str() {
            "help" => match preparsed.args.first() {
                None => self.main_help_text(streams).map(|()| 0),
                Some(name) => match self.fetch_command(name, streams)? {
                    Some(command) => {
                        print_help(
                            &mut self.socon,
                            command.as_ref(),
                            &self.prog_name,
                            name,
                            streams.out,
                        )?;
                        Ok(0)
                    }
                    None => Ok(1),
                },
            },
            "version" => {
                writeln!(streams.out, "{VERSION}")?;
                Ok(0)
            }
            _ if version_flag => {
                writeln!(streams.out, "{VERSION}")?;
                Ok(0)
            }
            _ if help_flag => self.main_help_text(streams).map(|()| 0),
            name => match self.fetch_command(name, streams)? {
                Some(command) => run_from_argv(&mut self.socon, command, &self.argv, streams),
                None => Ok(1),
            },
        }
    }

    /// The command list, followed by settings and project loading notes.
    pub fn main_help_text(&mut self, streams: &mut Streams<'_>) -> Result<()> {
        get_commands(&mut self.socon, COMMANDS_MANAGER)?;
        let usage = commands_usage(&self.socon, COMMANDS_MANAGER, &self.prog_name, true)?;
        writeln!(streams.out, "{usage}")?;

        if let Some(err) = &self.settings_exception {
            write!(streams.out, "\n{}", separator("Settings error"))?;
            writeln!(
                streams.out,
                "\nNote that only Socon core commands are listed as settings are not \
                 properly configured (error: {err})."
            )?;
        }

        let projects = self.socon.registry().projects();
        if projects.registry_ready() && !projects.unregistered_configs().is_empty() {
            write!(streams.out, "\n{}", separator("Project loading error"))?;
            writeln!(
                streams.out,
                "\nSome of your projects didn't load correctly. If you want more \
                 informations about the errors, use the 'check' command. List of projects:"
            )?;
            for (name, _) in projects.unregistered_configs() {
                writeln!(streams.out, "{name}")?;
            }
        }
        writeln!(streams.out)?;
        Ok(())
    }

    /// Find command `name`, or report why it is unreachable. `None` means
    /// the report was written and the process should exit with 1.
    pub fn fetch_command(
        &mut self,
        name: &str,
        streams: &mut Streams<'_>,
    ) -> Result<Option<Arc<dyn Command>>> {
        get_commands(&mut self.socon, COMMANDS_MANAGER)?;
        match search_command(&self.socon, COMMANDS_MANAGER, name, None) {
            Err(CliError::CommandNotFound(_)) => {}
            other => return other.map(Some),
        }

        if self
            .socon
            .env()
            .get(SETTINGS_VARIABLE)
            .is_some_and(|module| !module.is_empty())
        {
            self.socon.setting(INSTALLED_PROJECTS)?;
        } else if !self.socon.settings_configured() {
            writeln!(streams.err, "No Socon settings specified.")?;
        }

        let manager = self.socon.manager(COMMANDS_MANAGER)?;
        let names = manager.get_hooks_name()?;
        let candidates: Vec<&str> = names.iter().map(String::as_str).collect();
        let matches = get_close_matches(name, &candidates, 3, 0.6);

        write!(streams.err, "Unknown command: '{name}'")?;
        match matches.first() {
            Some(&closest) if closest != name => {
                write!(streams.err, ". Did you mean {closest}?")?;
            }
            Some(_) => {
                let holders = manager.get_hook_config_holders(name)?;
                write!(
                    streams.err,
                    ". You might have missed to specify the project. You must either define \
                     the environment variable {ACTIVE_PROJECT_VARIABLE} or add the --project \
                     argument to the command.\nYou can find below the list of the projects \
                     available: {}",
                    holders.join(", ")
                )?;
            }
            None => {}
        }
        write!(streams.err, "\nType '{} help' for usage.\n", self.prog_name)?;
        Ok(None)
    }
}

/// Parse argv for `command` and run it.
///
/// A [`CommandError`] is printed and turned into its return code unless
/// `--traceback` was passed.
pub fn run_from_argv(
    socon: &mut Socon,
    command: Arc<dyn Command>,
    argv: &[String],
    streams: &mut Streams<'_>,
) -> Result<i32> {
    let prog = argv.first().map(String::as_str).unwrap_or_default();
    let name = argv.get(1).map(String::as_str).unwrap_or_default();

    let (command, options) = if let Some(manager) = command.subcommand_manager() {
        let manager = manager.to_string();
        match parse_subcommand(socon, command.as_ref(), &manager, argv, streams)? {
            Dispatch::Run(sub, options) => (sub, options),
            Dispatch::Exit(code) => return Ok(code),
        }
    } else {
        let parser = create_parser(command.as_ref(), prog, name);
        match parse_options(command.as_ref(), parser, argv.get(2..).unwrap_or_default().iter().cloned()) {
            Ok(options) => (command, options),
            Err(err) => return report_parse_error(&err, streams),
        }
    };

    options.defaults.apply(socon.env_mut());
    let traceback = options.defaults.traceback;
    let result = {
        let mut ctx = CommandContext::new(socon, options, &mut *streams.out);
        execute(command.as_ref(), &mut ctx)
    };
    match result {
        Ok(()) => Ok(0),
        Err(CliError::Command(err)) if !traceback => {
            writeln!(streams.err, "CommandError: {err}")?;
            Ok(err.returncode())
        }
        Err(err) => Err(err),
    }
}

enum Dispatch {
    Run(Arc<dyn Command>, Options),
    Exit(i32),
}

/// Resolve `argv[2]` in the group's subcommand manager and parse the rest
/// with the subcommand's parser.
fn parse_subcommand(
    socon: &mut Socon,
    group: &dyn Command,
    manager: &str,
    argv: &[String],
    streams: &mut Streams<'_>,
) -> Result<Dispatch> {
    let prog = argv.first().map(String::as_str).unwrap_or_default();
    let name = argv.get(1).map(String::as_str).unwrap_or_default();
    let group_usage = format!("{name} SUBCOMMAND");

    let Some(subcommand) = argv.get(2).filter(|arg| !arg.starts_with('-')) else {
        print_help(socon, group, prog, &group_usage, streams.out)?;
        return Ok(Dispatch::Exit(0));
    };

    get_commands(socon, manager)?;
    let sub = match search_command(socon, manager, subcommand, None) {
        Ok(sub) => sub,
        Err(CliError::CommandNotFound(_)) => {
            writeln!(streams.err, "Error: Unknown subcommand '{subcommand}'")?;
            print_help(socon, group, prog, &group_usage, streams.out)?;
            return Ok(Dispatch::Exit(1));
        }
        Err(err) => return Err(err),
    };

    let parser = create_parser(sub.as_ref(), prog, &format!("{name} {subcommand}"));
    match parse_options(sub.as_ref(), parser, argv.get(3..).unwrap_or_default().iter().cloned()) {
        Ok(options) => Ok(Dispatch::Run(sub, options)),
        Err(err) => report_parse_error(&err, streams).map(Dispatch::Exit),
    }
}

fn report_parse_error(err: &clap::Error, streams: &mut Streams<'_>) -> Result<i32> {
    let rendered = err.render();
    if err.use_stderr() {
        write!(streams.err, "{rendered}")?;
    } else {
        write!(streams.out, "{rendered}")?;
    }
    Ok(err.exit_code())
}

/// Write the help of `command`, with the subcommand list for groups.
pub fn print_help(
    socon: &mut Socon,
    command: &dyn Command,
    prog_name: &str,
    subcommand: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let mut parser = create_parser(command, prog_name, subcommand);
    write!(out, "{}", parser.render_help())?;
    if let Some(manager) = command.subcommand_manager() {
        get_commands(socon, manager)?;
        let usage = commands_usage(socon, manager, prog_name, false)?;
        write!(out, "\n{usage}\n")?;
    }
    Ok(())
}

/// Run `argv` with the process environment, writing to stdout and stderr.
pub fn execute_from_command_line(argv: Vec<String>, modules: Catalog) -> Result<i32> {
    let mut utility = ManagementUtility::new(argv, modules)?;
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    utility.execute(&mut Streams::new(&mut out, &mut err))
}

/// Run command `name` with `args` and return what it wrote.
///
/// `--project <label>` among `args` selects the project for both the
/// search and the run; the active project is restored afterwards. Argument
/// errors become [`CommandError`]s.
pub fn call_command(socon: &mut Socon, name: &str, args: &[&str]) -> Result<String> {
    get_commands(socon, COMMANDS_MANAGER)?;

    let mut project = None;
    for (i, arg) in args.iter().enumerate() {
        if *arg == "--project" {
            let value = args
                .get(i + 1)
                .ok_or_else(|| CommandError::new("Project was passed but not defined"))?;
            project = Some(value.to_string());
        }
    }

    let command = search_command(socon, COMMANDS_MANAGER, name, project.as_deref())?;
    let parser = create_parser(command.as_ref(), "", name);
    let options = parse_options(command.as_ref(), parser, args.iter().copied())
        .map_err(|err| parse_error(&err))?;

    let previous = socon.env().get(ACTIVE_PROJECT_VARIABLE).map(str::to_string);
    let active = project.or_else(|| previous.clone()).unwrap_or_default();
    socon.env_mut().set(ACTIVE_PROJECT_VARIABLE, active);

    let mut output = Vec::new();
    let result = {
        let mut ctx = CommandContext::new(socon, options, &mut output);
        execute(command.as_ref(), &mut ctx)
    };

    match previous {
        Some(value) => socon.env_mut().set(ACTIVE_PROJECT_VARIABLE, value),
        None => {
            socon.env_mut().remove(ACTIVE_PROJECT_VARIABLE);
        }
    }
    result?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}
