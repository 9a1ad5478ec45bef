//! Command fixtures shared by the socon-cli test suites.
//!
//! - `cli_site`: settings container (`cli_site.settings`, `cli_site.broken`)
//! - `user_commands`: a project with general, project-scoped and grouped
//!   commands
//! - `other_commands`: a second project, holding another `launch`

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};
use socon_cli::{
    Command, CommandContext, CommandError, CommandKind, ManagementUtility, ProjectAccess,
    Streams, command_hook, subcommand_manager,
};
use socon_core::{ACTIVE_PROJECT_VARIABLE, Catalog, Environ, ModuleDef, Socon};
use socon_test_utils::{SETTINGS_VARIABLE, TestSocon};

pub const SETTINGS: &str = "cli_site.settings";
pub const BROKEN_SETTINGS: &str = "cli_site.broken";
pub const SUBS_MANAGER: &str = "with_subs";

// =============================================================================
// Commands
// =============================================================================

pub struct LaunchCommand;

impl Command for LaunchCommand {
    fn help(&self) -> &str {
        "Launch a rocket"
    }

    fn add_arguments(&self, parser: clap::Command) -> clap::Command {
        parser
            .arg(
                Arg::new("integer")
                    .default_value("0")
                    .value_parser(value_parser!(i64)),
            )
            .arg(Arg::new("spaceship").short('s').long("spaceship"))
            .arg(
                Arg::new("example")
                    .short('x')
                    .long("example")
                    .action(ArgAction::SetTrue),
            )
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        if let Some(spaceship) = ctx.get_option::<String>("spaceship") {
            if spaceship == "raise" {
                return Err(CommandError::new("Houston, we have a problem")
                    .with_returncode(3)
                    .into());
            }
            writeln!(ctx.out(), "Launching {spaceship}")?;
        }
        let integer = ctx.get_option::<i64>("integer").unwrap_or_default();
        if integer > 0 {
            writeln!(ctx.out(), "You passed {integer} as a positional argument.")?;
        }
        if ctx.get_flag("example") {
            writeln!(ctx.out(), "Example mode")?;
        }
        Ok(())
    }
}

pub struct OtherLaunchCommand;

impl Command for OtherLaunchCommand {
    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        writeln!(ctx.out(), "Launching from other_commands")?;
        Ok(())
    }
}

pub struct LaunchExtrasCommand;

impl Command for LaunchExtrasCommand {
    fn keep_extras_args(&self) -> bool {
        true
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        let extras = ctx.extras_args().to_vec();
        writeln!(ctx.out(), "Extras args = {extras:?}")?;
        Ok(())
    }
}

pub struct SimplePcCommand;

impl Command for SimplePcCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Project(ProjectAccess::All)
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        let label = ctx
            .project()
            .map(|config| config.label().to_string())
            .unwrap_or_default();
        writeln!(ctx.out(), "Hello from {label}")?;
        Ok(())
    }
}

pub struct RestrictedPcCommand;

impl Command for RestrictedPcCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Project(ProjectAccess::Only(vec!["other_commands".to_string()]))
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        writeln!(ctx.out(), "Restricted")?;
        Ok(())
    }
}

pub struct FleetCommand;

impl Command for FleetCommand {
    fn help(&self) -> &str {
        "Manage the fleet"
    }

    fn subcommand_manager(&self) -> Option<&str> {
        Some(SUBS_MANAGER)
    }

    fn handle(&self, _ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        Ok(())
    }
}

pub struct Sub1Command;

impl Command for Sub1Command {
    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        writeln!(ctx.out(), "sub1")?;
        Ok(())
    }
}

pub struct Sub2Command;

impl Command for Sub2Command {
    fn add_arguments(&self, parser: clap::Command) -> clap::Command {
        parser.arg(Arg::new("target"))
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        let target = ctx.get_option::<String>("target").unwrap_or_default();
        writeln!(ctx.out(), "sub2 {target}")?;
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

fn root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn package(name: &str) -> ModuleDef {
    ModuleDef::new(name).path(root().join(name))
}

/// The command fixtures, without the framework modules.
pub fn cli_catalog() -> Catalog {
    Catalog::new()
        .with(package("cli_site"))
        .with(
            ModuleDef::new(SETTINGS)
                .value("INSTALLED_PROJECTS", vec!["user_commands", "other_commands"])
                .value("LOGGING_CONFIG", ""),
        )
        .with(
            ModuleDef::new(BROKEN_SETTINGS)
                .value("INSTALLED_PROJECTS", vec!["user_commands", "missing_project"])
                .value("LOGGING_CONFIG", ""),
        )
        .with(package("user_commands"))
        .with(ModuleDef::new("user_commands.managers").init(|scope| {
            scope.manager(subcommand_manager(SUBS_MANAGER));
            Ok(())
        }))
        .with(ModuleDef::new("user_commands.management.commands.launch").init(|scope| {
            scope.hook(command_hook(LaunchCommand));
            Ok(())
        }))
        .with(
            ModuleDef::new("user_commands.management.commands.launch_extras").init(|scope| {
                scope.hook(command_hook(LaunchExtrasCommand).name("launch_extras"));
                Ok(())
            }),
        )
        .with(ModuleDef::new("user_commands.management.commands.project").init(|scope| {
            scope
                .hook(command_hook(SimplePcCommand).name("simple_pc"))
                .hook(command_hook(RestrictedPcCommand).name("restricted_pc"));
            Ok(())
        }))
        .with(ModuleDef::new("user_commands.management.commands.fleet").init(|scope| {
            scope.hook(command_hook(FleetCommand));
            Ok(())
        }))
        .with(ModuleDef::new("user_commands.management.commands._private").init(|scope| {
            scope.hook(command_hook(Sub1Command).name("private"));
            Ok(())
        }))
        .with(
            ModuleDef::new("user_commands.management.commands.subcommands.ships").init(|scope| {
                scope
                    .hook(command_hook(Sub1Command).manager(SUBS_MANAGER))
                    .hook(command_hook(Sub2Command).manager(SUBS_MANAGER));
                Ok(())
            }),
        )
        .with(package("other_commands"))
        .with(ModuleDef::new("other_commands.management.commands.launch").init(|scope| {
            scope.hook(command_hook(OtherLaunchCommand).name("launch"));
            Ok(())
        }))
}

/// The framework modules plus [`cli_catalog`].
pub fn full_catalog() -> Catalog {
    let mut catalog = socon_cli::catalog();
    catalog.merge(cli_catalog());
    catalog
}

/// A handle set up with `cli_site.settings`.
pub fn socon() -> Socon {
    TestSocon::unconfigured()
        .modules(full_catalog())
        .settings_module(SETTINGS)
        .setup()
}

pub fn env(settings: Option<&str>, project: Option<&str>) -> Environ {
    let mut env = Environ::new();
    if let Some(settings) = settings {
        env.set(SETTINGS_VARIABLE, settings);
    }
    if let Some(project) = project {
        env.set(ACTIVE_PROJECT_VARIABLE, project);
    }
    env
}

/// Output of one utility run.
#[derive(Debug)]
pub struct Run {
    pub code: i32,
    pub out: String,
    pub err: String,
}

/// Run `socon <args>` over the fixtures, returning the utility error.
pub fn try_run(args: &[&str], env: Environ) -> (socon_cli::Result<i32>, String, String) {
    let argv = std::iter::once("socon")
        .chain(args.iter().copied())
        .map(String::from)
        .collect();
    let mut utility = ManagementUtility::with_env(argv, cli_catalog(), env).unwrap();
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let result = utility.execute(&mut Streams::new(&mut out, &mut err));
    (
        result,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

/// Run `socon <args>` over the fixtures.
pub fn run(args: &[&str], env: Environ) -> Run {
    let (result, out, err) = try_run(args, env);
    Run {
        code: result.unwrap(),
        out,
        err,
    }
}
