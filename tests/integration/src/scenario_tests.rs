//! Cross-crate scenarios
//!
//! Each test builds its own `Socon` handle, either over the shared fixture
//! catalog or over a small catalog declared here, and drives it through the
//! public APIs of socon-core and socon-cli.

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use socon_cli::{
    CliError, Command, CommandContext, CommandKind, ManagementUtility, ProjectAccess, Streams,
    call_command, command_hook,
};
use socon_core::{
    ACTIVE_PROJECT_VARIABLE, Catalog, Environ, ModuleDef, OverrideSettings, RegistryKind,
};
use socon_test_utils::{DEFAULT_MANAGER, Greeter, SETTINGS_VARIABLE, TestSocon};

// =============================================================================
// Scenario catalog
// =============================================================================

struct LaunchCommand;

impl Command for LaunchCommand {
    fn handle(&self, ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        writeln!(ctx.out(), "Launched")?;
        Ok(())
    }
}

struct NobodyCommand;

impl Command for NobodyCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Project(ProjectAccess::Only(Vec::new()))
    }

    fn handle(&self, _ctx: &mut CommandContext<'_>) -> socon_cli::Result<()> {
        Ok(())
    }
}

/// `site` container installing project `a`, which alone holds `launch`.
fn site_catalog() -> Catalog {
    Catalog::new()
        .with(ModuleDef::new("site").path("/srv/site"))
        .with(
            ModuleDef::new("site.settings")
                .value("INSTALLED_PROJECTS", vec!["a"])
                .value("LOGGING_CONFIG", ""),
        )
        .with(ModuleDef::new("site.management.commands.nobody").init(|scope| {
            scope.hook(command_hook(NobodyCommand));
            Ok(())
        }))
        .with(ModuleDef::new("a").path("/srv/a"))
        .with(ModuleDef::new("a.management.commands.launch").init(|scope| {
            scope.hook(command_hook(LaunchCommand));
            Ok(())
        }))
        .with(ModuleDef::new("b").path("/srv/b"))
}

fn dispatch(args: &[&str], env: Environ) -> (i32, String, String) {
    let argv = std::iter::once("socon")
        .chain(args.iter().copied())
        .map(String::from)
        .collect();
    let mut utility = ManagementUtility::with_env(argv, site_catalog(), env).unwrap();
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let code = utility
        .execute(&mut Streams::new(&mut out, &mut err))
        .unwrap();
    (
        code,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

fn site_env() -> Environ {
    let mut env = Environ::new();
    env.set(SETTINGS_VARIABLE, "site.settings");
    env
}

fn greeting(socon: &socon_core::Socon, name: &str, label: Option<&str>) -> &'static str {
    let config = label.map(|label| {
        socon
            .registry()
            .projects()
            .get_registry_config(label)
            .unwrap()
    });
    let hook = socon
        .search_hook_impl(DEFAULT_MANAGER, name, config.as_deref())
        .unwrap();
    hook.downcast_ref::<Greeter>().unwrap().execute()
}

// =============================================================================
// Registry population
// =============================================================================

#[test]
fn test_unique_identifiers_populate() {
    let socon = TestSocon::new().setup();
    let projects = socon.registry().projects();

    assert!(projects.registry_ready());
    assert_eq!(projects.labels().unwrap(), vec!["manager", "registry"]);
    assert_eq!(projects.get_registry_configs().unwrap().len(), 2);
}

#[test]
fn test_duplicate_label_imports_nothing() {
    let mut socon = TestSocon::new().setup();

    let err = socon
        .set_installed_configs(
            RegistryKind::Projects,
            ["registry.config_with_manager", "registry.config_with_manager"],
            false,
        )
        .unwrap_err();

    assert!(err.to_string().contains("duplicates: config_with_manager"));
    assert!(!socon.is_imported("registry.config_with_manager.managers"));
    assert!(!socon.managers().names().contains(&"test_manager".to_string()));
    assert!(socon.unset_installed_configs(RegistryKind::Projects));
}

#[test]
fn test_longest_prefix_wins() {
    let mut socon = TestSocon::new()
        .modules(
            Catalog::new()
                .with(ModuleDef::new("pkg").path("/srv/pkg"))
                .with(ModuleDef::new("pkg.sub.mod")),
        )
        .setup();
    let guard = socon
        .override_settings(OverrideSettings::new().installed_projects(["pkg", "pkg.sub"]))
        .unwrap();

    let registry = guard.registry();
    let config = registry.get_containing_registry_config("pkg.sub.mod").unwrap();
    assert_eq!(config.name(), "pkg.sub");
    let config = registry.get_containing_registry_config("pkg.other").unwrap();
    assert_eq!(config.name(), "pkg");
    assert!(registry.get_containing_registry_config("pkgs").is_none());
}

#[test]
fn test_override_round_trip() {
    let mut socon = TestSocon::new().setup();
    let before = socon.registry().projects().get_registry_configs().unwrap().to_vec();

    {
        let guard = socon
            .override_settings(
                OverrideSettings::new().installed_projects(["registry.one_config_project"]),
            )
            .unwrap();
        assert_eq!(
            guard.registry().projects().labels().unwrap(),
            vec!["one_config_project"]
        );
        let installed: Vec<String> = guard.setting_as("INSTALLED_PROJECTS").unwrap();
        assert_eq!(installed, vec!["registry.one_config_project"]);
    }

    let after = socon.registry().projects().get_registry_configs().unwrap();
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(after) {
        assert!(Arc::ptr_eq(old, new));
    }
    let installed: Vec<String> = socon.setting_as("INSTALLED_PROJECTS").unwrap();
    assert_eq!(installed, vec!["manager", "registry"]);
}

// =============================================================================
// Hooks
// =============================================================================

#[test]
fn test_find_hooks_impl_is_idempotent() {
    let mut socon = TestSocon::new().setup();
    let config = socon.registry().projects().get_registry_config("manager").unwrap();

    socon.find_hooks_impl(DEFAULT_MANAGER, &config).unwrap();
    socon.find_hooks_impl(DEFAULT_MANAGER, &config).unwrap();

    let manager = socon.manager(DEFAULT_MANAGER).unwrap();
    let names: Vec<&str> = manager
        .get_hooks(&config)
        .unwrap()
        .iter()
        .map(|hook| hook.name())
        .collect();
    assert_eq!(names, vec!["foo", "bar"]);
}

#[test]
fn test_configuration_hook_wins() {
    let mut socon = TestSocon::new().setup();
    socon.find_all(DEFAULT_MANAGER).unwrap();

    assert_eq!(greeting(&socon, "foo", Some("manager")), "Execute from manager");
    assert_eq!(greeting(&socon, "foo", None), "Execute from common");
    assert_eq!(greeting(&socon, "bar", Some("manager")), "Execute bar from manager");
}

#[test]
fn test_duplicate_hook_in_label() {
    let mut socon = TestSocon::new().setup();
    socon
        .set_installed_configs(RegistryKind::Projects, ["manager.duplicate_hooks"], false)
        .unwrap();
    let config = socon
        .registry()
        .projects()
        .get_registry_config("duplicate_hooks")
        .unwrap();

    let err = socon.find_hooks_impl(DEFAULT_MANAGER, &config).unwrap_err();
    assert_eq!(err.to_string(), "'foo' already exists. Duplicates:\nfoo");
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn test_launch_with_active_project() {
    let mut env = site_env();
    env.set(ACTIVE_PROJECT_VARIABLE, "a");

    let (code, out, err) = dispatch(&["launch"], env);
    assert_eq!(code, 0, "stderr: {err}");
    assert_eq!(out, "Launched\n");
}

#[test]
fn test_launch_without_active_project() {
    let (code, out, err) = dispatch(&["launch"], site_env());

    assert_eq!(code, 1);
    assert!(out.is_empty());
    assert!(err.starts_with("Unknown command: 'launch'. You might have missed"));
    assert!(err.contains("available: a\n"));
}

#[test]
fn test_command_restricted_to_nobody() {
    let mut socon = TestSocon::unconfigured()
        .modules(socon_cli::catalog())
        .modules(site_catalog())
        .settings_module("site.settings")
        .setup();
    let mut guard = socon
        .override_settings(OverrideSettings::new().installed_projects(["a", "b"]))
        .unwrap();

    for label in ["a", "b"] {
        let err = call_command(&mut guard, "nobody", &["--project", label]).unwrap_err();
        let CliError::Command(err) = err else {
            panic!("expected a command error, got {err:?}");
        };
        assert_eq!(
            err.message(),
            format!(
                "'{label}' project does not have access to this command.\n\
                 List of authorized projects:\n"
            )
        );
    }
}
