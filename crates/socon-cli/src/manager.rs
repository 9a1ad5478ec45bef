//! The command managers: declaration, search and usage listing

use std::sync::Arc;

use socon_core::{
    Error as CoreError, Hook, ManagerDef, ModuleLookup, RegistryKind, Socon,
};

use crate::command::{Command, CommandHook, CommandKind};
use crate::error::{CliError, CommandError, Result};

/// Manager of top-level commands.
pub const COMMANDS_MANAGER: &str = "commands";

/// Manager of the framework's subcommands.
pub const SUBCOMMANDS_MANAGER: &str = "subcommands";

/// Module searched for commands in every configuration.
pub const COMMANDS_LOOKUP: &str = "management.commands";

/// Module searched for subcommands in every configuration.
pub const SUBCOMMANDS_LOOKUP: &str = "management.commands.subcommands";

/// The `commands` manager.
pub fn commands_manager() -> ManagerDef {
    ManagerDef::new("CommandManager")
        .name(COMMANDS_MANAGER)
        .lookup_module(COMMANDS_LOOKUP)
        .lookup(ModuleLookup::Children)
}

/// A subcommand manager named `name`, searching
/// `management.commands.subcommands`.
pub fn subcommand_manager(name: &str) -> ManagerDef {
    ManagerDef::new("SubcommandManager")
        .name(name)
        .lookup_module(SUBCOMMANDS_LOOKUP)
        .lookup(ModuleLookup::Children)
}

/// Import the commands of every reachable configuration for `manager`.
pub fn get_commands(socon: &mut Socon, manager: &str) -> Result<()> {
    socon.find_all(manager)?;
    Ok(())
}

/// The command behind `hook`.
pub fn command_of(hook: &Hook) -> Result<Arc<dyn Command>> {
    hook.downcast_ref::<CommandHook>()
        .map(CommandHook::command)
        .ok_or_else(|| {
            CliError::Core(CoreError::ImproperlyConfigured(format!(
                "{} is registered in the '{}' manager but is not a command",
                hook.type_name(),
                hook.manager()
            )))
        })
}

/// Find command `name` in `manager`.
///
/// `project` takes precedence over the active project variable. The
/// selected project is searched first, then the usual hook search order
/// applies.
pub fn search_command(
    socon: &Socon,
    manager: &str,
    name: &str,
    project: Option<&str>,
) -> Result<Arc<dyn Command>> {
    let current = project
        .filter(|p| !p.is_empty())
        .or_else(|| socon.env().active_project());

    let config = match current {
        Some(label) => match socon.registry().projects().get_registry_config(label) {
            Ok(config) => Some(config),
            Err(CoreError::Lookup(_)) => {
                return Err(CommandError::new(format!(
                    "You are looking for '{name}' command in '{label}' project that is not \
                     installed. Please check your INSTALLED_PROJECTS"
                ))
                .into());
            }
            Err(err) => return Err(err.into()),
        },
        None => None,
    };

    match socon.search_hook_impl(manager, name, config.as_deref()) {
        Ok(hook) => command_of(&hook),
        Err(CoreError::HookNotFound(_)) => Err(CliError::CommandNotFound(format!(
            "'{name}' command does not exist"
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Listing of the commands of `manager`, grouped by registry and label.
///
/// `show_registry` is off for subcommand listings, which are flat.
pub fn commands_usage(
    socon: &Socon,
    manager: &str,
    prog_name: &str,
    show_registry: bool,
) -> Result<String> {
    let manager = socon.manager(manager)?;
    let mut usage = String::new();

    if !show_registry {
        usage.push_str("List of available subcommands:\n");
        for hook in manager.hooks() {
            usage.push_str(&format!("    {} ({})\n", hook.name(), marker(hook)));
        }
        return Ok(usage);
    }

    usage.push_str(&format!(
        "\nType '{prog_name} help <subcommand>' for help on a specific general (G) \
         subcommand. If this command \nis a project (P) subcommand. Add --project \
         <label> to the arguments.\n\n"
    ));

    let mut sections = Vec::new();
    for kind in RegistryKind::by_importance_order() {
        let hooks: Vec<&Hook> = manager
            .hooks()
            .iter()
            .filter(|hook| hook.registry() == kind)
            .collect();
        if hooks.is_empty() {
            continue;
        }
        let mut labels: Vec<&str> = Vec::new();
        for hook in &hooks {
            if !labels.contains(&hook.label()) {
                labels.push(hook.label());
            }
        }
        let mut section = underline(&format!("{} commands", title(kind.name())));
        let groups: Vec<String> = labels
            .iter()
            .map(|label| {
                let mut group = format!("  [{label}]\n\n");
                for hook in hooks.iter().filter(|hook| hook.label() == *label) {
                    group.push_str(&format!("    {} ({})\n", hook.name(), marker(hook)));
                }
                group
            })
            .collect();
        section.push_str(&groups.join("\n"));
        sections.push(section);
    }
    usage.push_str(&sections.join("\n"));
    Ok(usage)
}

fn marker(hook: &Hook) -> char {
    command_of(hook)
        .map(|command| command.kind().marker())
        .unwrap_or(CommandKind::General.marker())
}

fn title(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `text` over a line of dashes.
pub fn underline(text: &str) -> String {
    format!("{text}\n{}\n", "-".repeat(text.chars().count()))
}

/// A full-width separator with a centered title.
pub fn separator(title: &str) -> String {
    format!("{:-^80}\n", format!(" {title} "))
}
