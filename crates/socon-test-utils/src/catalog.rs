//! Fixture modules
//!
//! Three top-level packages, shaped like a real installation:
//!
//! - `common`: the settings container (`common.settings`) and its hooks
//! - `manager`: a project declaring the `default` manager plus sub-projects
//!   exercising every manager and hook error
//! - `registry`: projects exercising the configuration factory

use std::path::PathBuf;

use socon_core::{Catalog, ConfigClass, ConfigKind, HookDef, ManagerDef, ModuleDef};

/// Settings module of the fixture container.
pub const SETTINGS_MODULE: &str = "common.settings";

/// Projects installed by `common.settings`.
pub const INSTALLED_PROJECTS: [&str; 2] = ["manager", "registry"];

/// Name of the manager declared by the `manager` project.
pub const DEFAULT_MANAGER: &str = "default";

/// Hook implementation used by the fixtures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeter {
    message: &'static str,
}

impl Greeter {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }

    pub fn execute(&self) -> &'static str {
        self.message
    }
}

/// Root directory of the fixture packages. It does not exist on disk.
pub fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn package(name: &str) -> ModuleDef {
    ModuleDef::new(name).path(fixtures_root().join(name))
}

fn greeter(type_name: &str, name: &str, message: &'static str) -> HookDef {
    HookDef::new(type_name, Greeter::new(message))
        .name(name)
        .manager(DEFAULT_MANAGER)
}

/// Every fixture module.
pub fn fixture_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .merge(common_modules())
        .merge(manager_modules())
        .merge(registry_modules());
    catalog
}

/// The `common` container.
pub fn common_modules() -> Catalog {
    Catalog::new()
        .with(package("common"))
        .with(
            ModuleDef::new(SETTINGS_MODULE)
                .value("INSTALLED_PROJECTS", INSTALLED_PROJECTS.to_vec())
                .value("LOGGING_CONFIG", "")
                .module_attr("os", "std.os")
                .value("_PRIVATE", true),
        )
        .with(ModuleDef::new("common.lookup").init(|scope| {
            scope.hook(greeter("FooCommon", "foo", "Execute from common"));
            Ok(())
        }))
}

/// The `manager` project and its sub-projects.
pub fn manager_modules() -> Catalog {
    Catalog::new()
        .with(package("manager"))
        .with(ModuleDef::new("manager.managers").init(|scope| {
            scope
                .manager(
                    ManagerDef::new("DefaultManager")
                        .name(DEFAULT_MANAGER)
                        .lookup_module("lookup"),
                )
                .hook(
                    HookDef::new("HookOfDefaultManager", ())
                        .manager(DEFAULT_MANAGER)
                        .mark_abstract(),
                );
            Ok(())
        }))
        .with(ModuleDef::new("manager.lookup").init(|scope| {
            scope
                .hook(greeter("FooManager", "foo", "Execute from manager"))
                .hook(greeter("BarManager", "bar", "Execute bar from manager"));
            Ok(())
        }))
        .with(ModuleDef::new("manager.manager_with_abstract.lookup").init(|scope| {
            scope
                .hook(greeter("AbstractHook", "abstract", "abstract").mark_abstract())
                .hook(greeter("WillBeRegistered", "will_be_register", "registered"));
            Ok(())
        }))
        .with(ModuleDef::new("manager.hook_not_linked.managers").init(|scope| {
            scope.hook(HookDef::new("NotLinkedToManager", ()));
            Ok(())
        }))
        .with(ModuleDef::new("manager.missing_attr.managers").init(|scope| {
            scope.manager(ManagerDef::new("FooManager").name("foo"));
            Ok(())
        }))
        .with(ModuleDef::new("manager.duplicate_managers.managers").init(|scope| {
            scope
                .manager(ManagerDef::new("FooManager").name("foo").lookup_module("foo"))
                .manager(ManagerDef::new("FooManagerBis").name("foo").lookup_module("foo"));
            Ok(())
        }))
        .with(ModuleDef::new("manager.manager_not_hooked.managers").init(|scope| {
            scope.manager(
                ManagerDef::new("NotHookedManager")
                    .name("not_hooked_manager")
                    .lookup_module("not_hooked"),
            );
            Ok(())
        }))
        .with(ModuleDef::new("manager.manager_not_hooked.not_hooked").init(|scope| {
            scope.hook(HookDef::new("NowHooked", ()).manager("not_hooked_manager"));
            Ok(())
        }))
        .with(ModuleDef::new("manager.duplicate_hooks.lookup").init(|scope| {
            scope
                .hook(greeter("Foo", "foo", "first"))
                .hook(greeter("FooBis", "foo", "second"));
            Ok(())
        }))
        .with(ModuleDef::new("manager.outside_project.lookup").init(|scope| {
            scope.hook(greeter("Outside", "outside", "outside"));
            Ok(())
        }))
}

/// The `registry` project and the configuration factory fixtures.
pub fn registry_modules() -> Catalog {
    Catalog::new()
        .with(package("registry"))
        .with(
            ModuleDef::new("registry.default_config.projects")
                .config(ConfigClass::new("BadConfig", ConfigKind::Project))
                .class("NotAConfig")
                .config(
                    ConfigClass::new("NoSuchProject", ConfigKind::Project)
                        .name("there is no such project"),
                )
                .config(
                    ConfigClass::new("PlainProjectsConfig", ConfigKind::Project)
                        .name("registry.default_config.projects"),
                )
                .config(
                    ConfigClass::new("RelabeledProjectsConfig", ConfigKind::Project)
                        .name("registry.default_config.projects")
                        .label("relabeled"),
                ),
        )
        .with(
            ModuleDef::new("registry.one_config_project.projects").config(
                ConfigClass::new("OneConfig", ConfigKind::Project)
                    .name("registry.one_config_project"),
            ),
        )
        .with(
            ModuleDef::new("registry.two_configs_project.projects")
                .config(
                    ConfigClass::new("TwoConfig", ConfigKind::Project)
                        .name("registry.two_configs_project"),
                )
                .config(
                    ConfigClass::new("TwoConfigBis", ConfigKind::Project)
                        .name("registry.two_configs_project"),
                ),
        )
        .with(ModuleDef::new("registry.no_config_project"))
        .with(ModuleDef::new("registry.config_with_manager.managers").init(|scope| {
            scope
                .manager(
                    ManagerDef::new("Registry")
                        .name("test_manager")
                        .lookup_module("test_module"),
                )
                .hook(HookDef::new("Manager", ()).manager("test_manager"));
            Ok(())
        }))
        .with(
            ModuleDef::new("registry.config_with_settings.projects")
                .config(
                    ConfigClass::new("ProjectWithSettings", ConfigKind::Project)
                        .name("registry.config_with_settings.projects")
                        .label("other_settings")
                        .settings_module("management.config_folder.config"),
                )
                .config(
                    ConfigClass::new("ProjectWithWrongModule", ConfigKind::Project)
                        .name("registry.config_with_settings.projects")
                        .label("wrong_settings")
                        .settings_module("No settings module"),
                ),
        )
        .with(
            ModuleDef::new("registry.config_with_settings.management.config")
                .value("FOO", "foo")
                .value("BAR", "bar"),
        )
        .with(
            ModuleDef::new("registry.config_with_settings.management.config_folder.config")
                .value("SUPER_SETTINGS_1", "foo")
                .value("SUPER_SETTINGS_2", "bar"),
        )
        .with(ModuleDef::new("registry.plugins"))
}
