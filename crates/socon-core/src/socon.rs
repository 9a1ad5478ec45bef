//! The process handle
//!
//! [`Socon`] owns every piece of mutable framework state: the environment
//! snapshot, the module catalog, the lazy settings, the three registries,
//! the managers and the set of imported modules. Registration happens
//! through it, so there are no process globals.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use socon_conf::global_settings::{
    INSTALLED_PLUGINS, INSTALLED_PROJECTS, LOGGING, LOGGING_CONFIG,
    SKIP_ERROR_ON_PROJECTS_IMPORT,
};
use socon_conf::{LazySettings, SettingsLoader, SettingsModule, global_settings};

use crate::environ::Environ;
use crate::loader::{Catalog, Declaration, ModuleScope};
use crate::log::{SOCON_CORE_MODULE, configure_logging, core_catalog};
use crate::manager::{Hook, HookDef, Manager, ManagerRegistry};
use crate::registry::{Configuration, CoreRegistry, RegistryEntry, RegistryKind};
use crate::{Error, Result};

/// Settings loader backed by an environment snapshot and a catalog.
#[derive(Debug, Clone, Copy)]
pub struct ModuleLoader<'a> {
    env: &'a Environ,
    catalog: &'a Catalog,
}

impl<'a> ModuleLoader<'a> {
    pub fn new(env: &'a Environ, catalog: &'a Catalog) -> Self {
        Self { env, catalog }
    }
}

impl SettingsLoader for ModuleLoader<'_> {
    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).map(str::to_string)
    }

    fn load_settings_module(&self, name: &str) -> socon_conf::Result<SettingsModule> {
        self.catalog.load_settings_module(name)
    }
}

/// Framework state for one process.
#[derive(Debug)]
pub struct Socon {
    env: Environ,
    catalog: Catalog,
    settings: LazySettings,
    registry: CoreRegistry,
    managers: ManagerRegistry,
    imported_modules: HashSet<String>,
}

impl Socon {
    /// A handle reading the process environment.
    pub fn new(catalog: Catalog) -> Result<Self> {
        Self::with_env(catalog, Environ::from_process())
    }

    /// A handle over `catalog` and an explicit environment.
    ///
    /// The framework modules are registered first and the core
    /// configuration is installed, which imports its managers.
    pub fn with_env(catalog: Catalog, env: Environ) -> Result<Self> {
        let mut modules = core_catalog();
        modules.merge(catalog);
        let mut socon = Self {
            env,
            catalog: modules,
            settings: LazySettings::new(),
            registry: CoreRegistry::new(),
            managers: ManagerRegistry::new(),
            imported_modules: HashSet::new(),
        };
        socon.populate(RegistryKind::Common, [SOCON_CORE_MODULE], false, false)?;
        Ok(socon)
    }

    pub fn env(&self) -> &Environ {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environ {
        &mut self.env
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    pub fn managers(&self) -> &ManagerRegistry {
        &self.managers
    }

    pub fn manager(&self, name: &str) -> Result<&Manager> {
        self.managers.get_manager(name)
    }

    pub fn loader(&self) -> ModuleLoader<'_> {
        ModuleLoader::new(&self.env, &self.catalog)
    }

    // --- settings ---

    pub fn settings(&self) -> &LazySettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut LazySettings {
        &mut self.settings
    }

    /// Whether the settings were resolved or configured.
    pub fn settings_configured(&self) -> bool {
        self.settings.configured()
    }

    /// Read a setting, resolving the settings on first access.
    pub fn setting(&self, name: &str) -> Result<toml::Value> {
        Ok(self.settings.get(&self.loader(), name)?.clone())
    }

    /// Read a setting and deserialize it.
    pub fn setting_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        Ok(self.settings.get_as(&self.loader(), name)?)
    }

    pub fn set_setting(&mut self, name: impl Into<String>, value: toml::Value) -> Result<()> {
        let loader = ModuleLoader::new(&self.env, &self.catalog);
        Ok(self.settings.set(&loader, name, value)?)
    }

    /// Configure the settings by hand over the global defaults.
    pub fn configure<I, K>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, toml::Value)>,
        K: Into<String>,
    {
        Ok(self.settings.configure(global_settings(), overrides)?)
    }

    /// The container name, first component of the settings module.
    pub fn settings_module_name(&self) -> Option<String> {
        self.settings.settings_module_name(&self.loader())
    }

    // --- registries ---

    /// Populate a registry, then import the managers of every configuration
    /// it gained.
    pub fn populate<I, E>(
        &mut self,
        kind: RegistryKind,
        entries: I,
        skip_error: bool,
        lock: bool,
    ) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<RegistryEntry>,
    {
        let added = self.registry.get_mut(kind).populate_configs(
            entries.into_iter().map(Into::into),
            skip_error,
            lock,
            &self.catalog,
        )?;
        let Some(added) = added else {
            tracing::debug!(registry = %kind, "registry locked, population skipped");
            return Ok(());
        };
        for config in &added {
            let module = config.managers_module();
            if self.catalog.contains(&module) {
                self.import_module(&module)?;
            }
        }
        self.registry.get_mut(kind).mark_managers_ready();
        tracing::debug!(registry = %kind, added = added.len(), "registry populated");
        Ok(())
    }

    /// Replace a not-ready error with the settings error, if any.
    fn diagnose<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Err(Error::RegistryNotReady(msg)) => {
                self.settings.get(&self.loader(), LOGGING)?;
                Err(Error::RegistryNotReady(msg))
            }
            other => other,
        }
    }

    /// The framework's own configuration.
    pub fn socon_common_config(&self) -> Result<Arc<Configuration>> {
        self.diagnose(self.registry.get_socon_common_config())
    }

    /// The user's common configuration, named after the settings
    /// container. `None` when there is no container or it failed to load.
    pub fn user_common_config(&self) -> Option<Arc<Configuration>> {
        let container = self.settings_module_name()?;
        self.registry.common().get_registry_config(&container).ok()
    }

    /// Project configurations followed by plugin configurations.
    pub fn user_configs(&self) -> Result<Vec<Arc<Configuration>>> {
        self.diagnose(self.registry.get_user_configs())
    }

    /// Labels of the installed projects.
    pub fn project_labels(&self) -> Result<Vec<String>> {
        self.diagnose(self.registry.projects().labels())
    }

    /// The project named by the active project variable.
    pub fn project_config_by_env(&self) -> Result<Arc<Configuration>> {
        self.diagnose(self.registry.project_config_by_env(self.env.active_project()))
    }

    /// Replace the configurations of a registry, keeping the current state
    /// for [`Socon::unset_installed_configs`].
    pub fn set_installed_configs<I, E>(
        &mut self,
        kind: RegistryKind,
        entries: I,
        skip_error: bool,
    ) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<RegistryEntry>,
    {
        self.registry.get_mut(kind).store_state();
        self.populate(kind, entries, skip_error, true)
    }

    /// Restore the state saved by the last [`Socon::set_installed_configs`].
    pub fn unset_installed_configs(&mut self, kind: RegistryKind) -> bool {
        self.registry.get_mut(kind).restore_state()
    }

    // --- imports and registration ---

    /// Import a module: parents first, then its init routine, at most once.
    pub fn import_module(&mut self, name: &str) -> Result<()> {
        if self.imported_modules.contains(name) {
            return Ok(());
        }
        if !self.catalog.contains(name) {
            return Err(Error::Import(format!("No module named '{name}'")));
        }
        if let Some((parent, _)) = name.rsplit_once('.') {
            self.import_module(parent)?;
        }

        let init = self
            .catalog
            .module(name)
            .and_then(|def| def.init_fn().cloned());
        if let Some(init) = init {
            let mut scope = ModuleScope::new(name);
            init(&mut scope)?;
            for declaration in scope.into_declarations() {
                self.declare(name, declaration)?;
            }
        }
        self.imported_modules.insert(name.to_string());
        tracing::debug!(module = name, "module imported");
        Ok(())
    }

    pub fn is_imported(&self, name: &str) -> bool {
        self.imported_modules.contains(name)
    }

    fn declare(&mut self, module: &str, declaration: Declaration) -> Result<()> {
        match declaration {
            Declaration::Manager(def) => self.managers.add_manager(def.into_manager()?),
            Declaration::Hook(def) => self.register_hook(module, def),
        }
    }

    fn register_hook(&mut self, module: &str, def: HookDef) -> Result<()> {
        if def.is_abstract() {
            return Ok(());
        }
        let Some(manager) = def.manager_name().map(str::to_string) else {
            return Err(Error::ImproperlyConfigured(format!(
                "{} hook must be linked to a manager",
                def.type_name()
            )));
        };
        self.managers.get_manager(&manager)?;

        let Some(config) = self.registry.get_containing_registry_config(module) else {
            let container = self
                .settings_module_name()
                .map(|name| format!(" '{name}'"))
                .unwrap_or_default();
            return Err(Error::UnownedHook(format!(
                "{} class isn't in a project, plugin or in the common config. Check the \
                 INSTALLED_PROJECTS, INSTALLED_PLUGINS or the common config{container}",
                def.type_name()
            )));
        };
        let hook = def.into_hook(config, module)?;
        self.managers.get_manager_mut(&manager)?.add_hook_impl(hook)
    }

    // --- hook discovery ---

    /// Import the hooks of `config` for `manager`, once per label.
    ///
    /// The label is only marked imported once every lookup module loaded,
    /// so a failed import is retried, and reported, on the next call.
    pub fn find_hooks_impl(&mut self, manager: &str, config: &Configuration) -> Result<()> {
        let target = self.managers.get_manager(manager)?;
        if target.is_imported(config.label()) {
            return Ok(());
        }
        let modules = target.get_modules(config, &self.catalog);
        for module in modules {
            if self.catalog.contains(&module) {
                self.import_module(&module)?;
            }
        }
        self.managers
            .get_manager_mut(manager)?
            .mark_imported(config.label());
        Ok(())
    }

    /// Import the hooks of every reachable configuration for `manager`.
    ///
    /// Without configured settings only the framework's hooks are loaded.
    pub fn find_all(&mut self, manager: &str) -> Result<()> {
        let core = self.socon_common_config()?;
        self.find_hooks_impl(manager, &core)?;
        if !self.settings_configured() {
            return Ok(());
        }
        if let Some(common) = self.user_common_config() {
            self.find_hooks_impl(manager, &common)?;
        }
        for config in self.user_configs()? {
            self.find_hooks_impl(manager, &config)?;
        }
        Ok(())
    }

    /// Find the hook `name` of `manager`.
    ///
    /// `config` is searched first when given, then the user common
    /// configuration and the plugins (with configured settings only), then
    /// the framework configuration.
    pub fn search_hook_impl(
        &self,
        manager: &str,
        name: &str,
        config: Option<&Configuration>,
    ) -> Result<Hook> {
        let manager = self.managers.get_manager(manager)?;
        manager.is_hooked()?;
        if let Some(config) = config {
            if let Some(hook) = manager.get_hook(config, name)? {
                return Ok(hook.clone());
            }
        }

        let mut configs = Vec::new();
        if self.settings_configured() {
            configs.extend(self.user_common_config());
            configs.extend(self.registry.plugins().get_registry_configs()?.iter().cloned());
        }
        configs.push(self.socon_common_config()?);

        manager
            .first_hook_in(name, configs.iter().map(Arc::as_ref))?
            .cloned()
            .ok_or_else(|| manager.hook_not_found(name))
    }

    /// Configure logging and populate the plugin, project and container
    /// registries from the settings.
    pub fn setup(&mut self) -> Result<()> {
        let logging_config: String = self.setting_as(LOGGING_CONFIG)?;
        let logging = self.setting(LOGGING)?;
        configure_logging(&self.catalog, &logging_config, &logging)?;

        let plugins: Vec<String> = self.setting_as(INSTALLED_PLUGINS)?;
        self.populate(RegistryKind::Plugins, plugins, false, true)?;

        let projects: Vec<String> = self.setting_as(INSTALLED_PROJECTS)?;
        let skip: bool = self.setting_as(SKIP_ERROR_ON_PROJECTS_IMPORT)?;
        self.populate(RegistryKind::Projects, projects, skip, true)?;

        if let Some(container) = self.settings_module_name() {
            self.populate(RegistryKind::Common, [container], true, true)?;
        }
        tracing::info!("setup complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ModuleDef;
    use crate::manager::{ManagerDef, ModuleLookup};
    use crate::registry::ConfigKind;
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::new()
            .with(ModuleDef::new("socon.core.managers").init(|scope| {
                scope.manager(
                    ManagerDef::new("LookupManager")
                        .name("lookup")
                        .lookup_module("lookup")
                        .lookup(ModuleLookup::Single),
                );
                Ok(())
            }))
            .with(ModuleDef::new("socon.core.lookup").init(|scope| {
                scope.hook(HookDef::new("Foo", "core").name("foo").manager("lookup"));
                Ok(())
            }))
            .with(ModuleDef::new("site").path("/srv/site"))
            .with(ModuleDef::new("site.lookup").init(|scope| {
                scope
                    .hook(HookDef::new("Base", ()).manager("lookup").mark_abstract())
                    .hook(HookDef::new("Foo", "site").name("foo").manager("lookup"))
                    .hook(HookDef::new("Bar", "site").name("bar").manager("lookup"));
                Ok(())
            }))
            .with(ModuleDef::new("stray.lookup").init(|scope| {
                scope.hook(HookDef::new("Stray", ()).manager("lookup"));
                Ok(())
            }))
            .with(ModuleDef::new("unlinked").init(|scope| {
                scope.hook(HookDef::new("Unlinked", ()));
                Ok(())
            }))
            .with(ModuleDef::new("broken").path("/srv/broken"))
            .with(ModuleDef::new("broken.lookup").init(|scope| {
                scope.hook(HookDef::new("Broken", ()).manager("nope"));
                Ok(())
            }))
            .with(ModuleDef::new("unknown").init(|scope| {
                scope.hook(HookDef::new("Unknown", ()).manager("nope"));
                Ok(())
            }))
    }

    fn socon() -> Socon {
        Socon::with_env(catalog(), Environ::new()).unwrap()
    }

    #[test]
    fn test_core_config_installed_with_managers() {
        let socon = socon();
        let core = socon.socon_common_config().unwrap();
        assert_eq!(core.name(), "socon.core");
        assert_eq!(core.label(), "core");
        assert!(socon.registry().common().managers_ready());
        assert!(!socon.registry().common().is_locked());
        assert_eq!(socon.managers().names(), vec!["lookup"]);
        assert!(socon.is_imported("socon.core.managers"));
    }

    #[test]
    fn test_unconfigured_find_all_loads_core_only() {
        let mut socon = socon();
        socon.find_all("lookup").unwrap();

        let hook = socon.search_hook_impl("lookup", "foo", None).unwrap();
        assert_eq!(hook.downcast_ref::<&str>(), Some(&"core"));
        assert!(matches!(
            socon.search_hook_impl("lookup", "bar", None),
            Err(Error::HookNotFound(_))
        ));
    }

    #[test]
    fn test_find_hooks_impl_is_idempotent() {
        let mut socon = socon();
        socon.populate(RegistryKind::Projects, ["site"], false, true).unwrap();
        let site = socon.registry().projects().get_registry_config("site").unwrap();

        socon.find_hooks_impl("lookup", &site).unwrap();
        socon.find_hooks_impl("lookup", &site).unwrap();
        let hooks = socon.manager("lookup").unwrap().get_hooks(&site).unwrap();
        let names: Vec<&str> = hooks.iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }

    #[test]
    fn test_failed_lookup_is_reported_again() {
        let mut socon = socon();
        socon.populate(RegistryKind::Projects, ["broken"], false, true).unwrap();
        let broken = socon.registry().projects().get_registry_config("broken").unwrap();

        for _ in 0..2 {
            let err = socon.find_hooks_impl("lookup", &broken).unwrap_err();
            assert!(matches!(err, Error::ManagerNotFound(_)));
        }
        assert!(!socon.manager("lookup").unwrap().is_imported("broken"));
    }

    #[test]
    fn test_explicit_config_wins() {
        let mut socon = socon();
        socon.populate(RegistryKind::Projects, ["site"], false, true).unwrap();
        socon.find_all("lookup").unwrap();
        let site = socon.registry().projects().get_registry_config("site").unwrap();
        socon.find_hooks_impl("lookup", &site).unwrap();

        let hook = socon.search_hook_impl("lookup", "foo", Some(&site)).unwrap();
        assert_eq!(hook.label(), "site");
        let hook = socon.search_hook_impl("lookup", "foo", None).unwrap();
        assert_eq!(hook.label(), "core");
        let err = socon.search_hook_impl("lookup", "baz", Some(&site)).unwrap_err();
        assert_eq!(err.to_string(), "'baz' hook was not found in 'lookup' manager");
    }

    #[test]
    fn test_unowned_hook() {
        let mut socon = socon();
        let err = socon.import_module("stray.lookup").unwrap_err();
        assert!(matches!(err, Error::UnownedHook(_)));
        assert!(
            err.to_string()
                .starts_with("Stray class isn't in a project, plugin or in the common config.")
        );
        assert!(!socon.is_imported("stray.lookup"));
    }

    #[test]
    fn test_hook_declaration_errors() {
        let mut socon = socon();
        let err = socon.import_module("unlinked").unwrap_err();
        assert_eq!(err.to_string(), "Unlinked hook must be linked to a manager");

        let err = socon.import_module("unknown").unwrap_err();
        assert!(matches!(err, Error::ManagerNotFound(_)));
    }

    #[test]
    fn test_import_missing_module() {
        let mut socon = socon();
        let err = socon.import_module("nowhere").unwrap_err();
        assert_eq!(err.to_string(), "No module named 'nowhere'");
    }

    #[test]
    fn test_set_and_unset_installed_configs() {
        let mut socon = socon();
        socon.populate(RegistryKind::Projects, ["site"], false, true).unwrap();

        socon
            .set_installed_configs(RegistryKind::Projects, Vec::<String>::new(), false)
            .unwrap();
        assert!(socon.registry().projects().labels().unwrap().is_empty());

        assert!(socon.unset_installed_configs(RegistryKind::Projects));
        assert_eq!(socon.registry().projects().labels().unwrap(), vec!["site"]);
        assert!(!socon.unset_installed_configs(RegistryKind::Projects));
    }

    #[test]
    fn test_not_ready_surfaces_settings_error() {
        let socon = socon();
        let err = socon.user_configs().unwrap_err();
        assert!(matches!(err, Error::ImproperlyConfigured(_)));
        assert!(err.to_string().contains("settings are not configured"));
    }

    #[test]
    fn test_project_labels_surface_settings_error() {
        let mut env = Environ::new();
        env.set("SOCON_SETTINGS_MODULE", "nope");
        let socon = Socon::with_env(catalog(), env).unwrap();

        let err = socon.project_labels().unwrap_err();
        assert!(matches!(err, Error::Import(_)));
        assert_eq!(err.to_string(), "No module named 'nope'");
    }

    #[test]
    fn test_not_ready_with_configured_settings() {
        let mut socon = socon();
        socon.configure(Vec::<(String, toml::Value)>::new()).unwrap();
        assert!(matches!(socon.user_configs(), Err(Error::RegistryNotReady(_))));
    }

    #[test]
    fn test_setup_populates_from_settings() {
        let mut socon = socon();
        socon
            .configure([
                (INSTALLED_PROJECTS, toml::Value::from(vec!["site", "missing"])),
                (LOGGING_CONFIG, toml::Value::from("")),
            ])
            .unwrap();
        socon.setup().unwrap();

        assert_eq!(socon.registry().projects().labels().unwrap(), vec!["site"]);
        assert_eq!(socon.registry().projects().unregistered_configs().len(), 1);
        assert!(socon.registry().plugins().labels().unwrap().is_empty());
        assert!(socon.user_common_config().is_none());
        assert_eq!(
            socon.registry().projects().get_registry_configs().unwrap()[0].kind(),
            ConfigKind::Project
        );
    }

    #[test]
    fn test_setting_access() {
        let mut socon = socon();
        assert!(!socon.settings_configured());
        socon.configure([("FOO", toml::Value::from(3i64))]).unwrap();
        assert_eq!(socon.setting_as::<i64>("FOO").unwrap(), 3);
        socon.set_setting("FOO", toml::Value::from(4i64)).unwrap();
        assert_eq!(socon.setting("FOO").unwrap(), toml::Value::from(4i64));
        let skip: bool = socon.setting_as(SKIP_ERROR_ON_PROJECTS_IMPORT).unwrap();
        assert!(skip);
    }
}
