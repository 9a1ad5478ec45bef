//! `check`: report projects that failed to load and managers whose hooks
//! cannot be imported.


use clap::{Arg, ArgAction};
use socon_conf::global_settings::SKIP_ERROR_ON_PROJECTS_IMPORT;

use crate::cli::SETTINGS_VARIABLE;
use crate::command::{Command, CommandContext};
use crate::error::{CommandError, Result};
use crate::manager::{separator, underline};

const SHOW_ALL: &str = "show_all";

#[derive(Debug, Default, Clone, Copy)]
pub struct CheckCommand;

impl Command for CheckCommand {
    fn help(&self) -> &str {
        "Check the integrity of any installed projects and their managers"
    }

    fn add_arguments(&self, parser: clap::Command) -> clap::Command {
        parser.arg(
            Arg::new(SHOW_ALL)
                .long("show-all")
                .action(ArgAction::SetTrue)
                .help("Report every failure instead of stopping at the first one"),
        )
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        if !ctx.socon().settings_configured() {
            return Err(CommandError::new(format!(
                "Settings are not configured. You must either define the environment \
                 variable {SETTINGS_VARIABLE} or pass the --settings argument."
            ))
            .into());
        }
        let show_all = ctx.get_flag(SHOW_ALL);
        let mut issues = 0;

        if ctx.socon().setting_as::<bool>(SKIP_ERROR_ON_PROJECTS_IMPORT)? {
            issues += check_projects(ctx, show_all)?;
        }
        issues += check_managers(ctx, show_all)?;

        if issues > 0 {
            return Err(CommandError::new(format!("{issues} issue(s) found")).into());
        }
        Ok(())
    }
}

fn check_projects(ctx: &mut CommandContext<'_>, show_all: bool) -> Result<usize> {
    let failures: Vec<(String, String)> = ctx
        .socon()
        .registry()
        .projects()
        .unregistered_configs()
        .iter()
        .map(|(name, err)| (name.clone(), err.to_string()))
        .collect();

    write!(ctx.out(), "{}", separator("Projects check"))?;
    if failures.is_empty() {
        writeln!(ctx.out(), "Nothing to report. All projects loaded successfully.")?;
        return Ok(0);
    }
    if !show_all {
        let (name, err) = &failures[0];
        return Err(CommandError::new(format!("'{name}' project failed to load: {err}")).into());
    }
    for (name, err) in &failures {
        write!(ctx.out(), "{}", underline(name))?;
        writeln!(ctx.out(), "{err}\n")?;
    }
    Ok(failures.len())
}

fn check_managers(ctx: &mut CommandContext<'_>, show_all: bool) -> Result<usize> {
    let socon = ctx.socon();
    let mut configs: Vec<_> = socon.user_common_config().into_iter().collect();
    configs.extend(socon.user_configs()?);
    let managers = socon.managers().names();

    write!(ctx.out(), "{}", separator("Managers check"))?;
    let mut failures = 0;
    for manager in &managers {
        for config in &configs {
            let Err(err) = ctx.socon_mut().find_hooks_impl(manager, config) else {
                continue;
            };
            if !show_all {
                return Err(err.into());
            }
            failures += 1;
            write!(
                ctx.out(),
                "{}",
                underline(&format!("{manager} ({})", config.label()))
            )?;
            writeln!(ctx.out(), "{err}\n")?;
        }
    }
    if failures == 0 {
        writeln!(ctx.out(), "Nothing to report. All managers loaded successfully.")?;
    }
    Ok(failures)
}
