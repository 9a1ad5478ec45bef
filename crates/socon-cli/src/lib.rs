//! Command dispatch for the socon framework
//!
//! Commands are hooks of the `commands` manager, discovered in the
//! `management.commands` package of every configuration. The
//! [`ManagementUtility`] resolves the settings, sets up the registries and
//! runs the command named on the command line; [`call_command`] runs one
//! programmatically and returns its output.

mod cli;
mod command;
pub mod commands;
mod error;
mod manager;
mod utility;

use socon_core::{Catalog, ModuleDef};

pub use cli::{DefaultOptions, SETTINGS_VARIABLE};
pub use command::{
    Command, CommandContext, CommandHook, CommandKind, EXTRAS_ARGS, Options, ProjectAccess,
    VERSION, command_hook, command_name, create_parser, execute, parse_options,
};
pub use error::{CliError, CommandError, Result};
pub use manager::{
    COMMANDS_LOOKUP, COMMANDS_MANAGER, SUBCOMMANDS_LOOKUP, SUBCOMMANDS_MANAGER, command_of,
    commands_manager, commands_usage, get_commands, search_command, subcommand_manager,
};
pub use utility::{
    ManagementUtility, Streams, call_command, execute_from_command_line, print_help,
    run_from_argv,
};

/// The framework modules declaring the command managers and the built-in
/// commands. Merge it into a catalog before building a [`socon_core::Socon`]
/// that dispatches commands.
pub fn catalog() -> Catalog {
    Catalog::new()
        .with(ModuleDef::new("socon.core.managers").init(|scope| {
            scope
                .manager(commands_manager())
                .manager(subcommand_manager(SUBCOMMANDS_MANAGER));
            Ok(())
        }))
        .with(
            ModuleDef::new("socon.core.management.commands.check").init(|scope| {
                scope.hook(command_hook(commands::CheckCommand));
                Ok(())
            }),
        )
}
