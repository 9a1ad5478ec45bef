//! Managers and hook implementations
//!
//! A [`Manager`] is a named capability, `commands` for instance, that
//! imports a lookup module from every configuration and indexes the hooks
//! those modules declare. Hooks are stored flat and keyed by
//! `(registry, label, hook name)`.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::loader::Catalog;
use crate::registry::{Configuration, RegistryKind};
use crate::{Error, Result};

/// How a manager finds the modules to import for a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleLookup {
    /// `<config>.<lookup_module>` itself.
    #[default]
    Single,
    /// Direct, non-package children of `<config>.<lookup_module>` whose
    /// name does not start with `_`.
    Children,
}

/// Declaration of a manager, validated when registered.
#[derive(Debug, Clone)]
pub struct ManagerDef {
    type_name: String,
    name: Option<String>,
    lookup_module: Option<String>,
    lookup: ModuleLookup,
}

impl ManagerDef {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
            lookup_module: None,
            lookup: ModuleLookup::Single,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Module imported from every configuration, relative to it.
    pub fn lookup_module(mut self, module: impl Into<String>) -> Self {
        self.lookup_module = Some(module.into());
        self
    }

    pub fn lookup(mut self, lookup: ModuleLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn into_manager(self) -> Result<Manager> {
        let missing = |attr: &str| {
            Error::ImproperlyConfigured(format!(
                "'{}' must supply a {attr} attribute",
                self.type_name
            ))
        };
        let name = self.name.clone().ok_or_else(|| missing("name"))?;
        let lookup_module = self
            .lookup_module
            .clone()
            .ok_or_else(|| missing("lookup_module"))?;
        Ok(Manager::new(self.type_name, name, lookup_module, self.lookup))
    }
}

/// Declaration of a hook implementation.
///
/// The implementation is an arbitrary value; consumers downcast it to the
/// capability type their manager deals in.
#[derive(Clone)]
pub struct HookDef {
    type_name: String,
    name: Option<String>,
    manager: Option<String>,
    is_abstract: bool,
    imp: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for HookDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDef")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("manager", &self.manager)
            .field("is_abstract", &self.is_abstract)
            .finish_non_exhaustive()
    }
}

impl HookDef {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, imp: T) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
            manager: None,
            is_abstract: false,
            imp: Arc::new(imp),
        }
    }

    /// Explicit hook name. Defaults to the type name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = Some(manager.into());
        self
    }

    /// Abstract hooks are never registered.
    pub fn mark_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn hook_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.type_name)
    }

    pub fn manager_name(&self) -> Option<&str> {
        self.manager.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub(crate) fn into_hook(self, config: Arc<Configuration>, module: &str) -> Result<Hook> {
        let manager = self.manager.ok_or_else(|| {
            Error::ImproperlyConfigured(format!(
                "{} hook must be linked to a manager",
                self.type_name
            ))
        })?;
        let registry = config.registry().ok_or_else(|| {
            Error::ImproperlyConfigured(format!(
                "{} is not installed in any registry",
                config.name()
            ))
        })?;
        Ok(Hook {
            name: self.name.unwrap_or_else(|| self.type_name.clone()),
            type_name: self.type_name,
            manager,
            registry,
            module: module.to_string(),
            config,
            imp: self.imp,
        })
    }
}

/// A registered hook implementation.
#[derive(Clone)]
pub struct Hook {
    name: String,
    type_name: String,
    manager: String,
    registry: RegistryKind,
    module: String,
    config: Arc<Configuration>,
    imp: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("manager", &self.manager)
            .field("registry", &self.registry)
            .field("label", &self.config.label())
            .finish_non_exhaustive()
    }
}

impl Hook {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn registry(&self) -> RegistryKind {
        self.registry
    }

    /// Module the hook was declared in.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn label(&self) -> &str {
        self.config.label()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.imp.downcast_ref::<T>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HookKey {
    registry: RegistryKind,
    label: String,
    name: String,
}

/// A named capability indexing hooks per configuration.
#[derive(Debug)]
pub struct Manager {
    type_name: String,
    name: String,
    lookup_module: String,
    lookup: ModuleLookup,
    hooks: Vec<Hook>,
    index: HashMap<HookKey, usize>,
    imported: HashSet<String>,
}

impl Manager {
    fn new(type_name: String, name: String, lookup_module: String, lookup: ModuleLookup) -> Self {
        Self {
            type_name,
            name,
            lookup_module,
            lookup,
            hooks: Vec::new(),
            index: HashMap::new(),
            imported: HashSet::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup_module(&self) -> &str {
        &self.lookup_module
    }

    pub fn lookup(&self) -> ModuleLookup {
        self.lookup
    }

    /// Record that hooks of `label` were imported. Returns `false` when they
    /// already were.
    pub fn mark_imported(&mut self, label: &str) -> bool {
        self.imported.insert(label.to_string())
    }

    pub fn is_imported(&self, label: &str) -> bool {
        self.imported.contains(label)
    }

    /// Modules to import to discover the hooks of `config`.
    pub fn get_modules(&self, config: &Configuration, catalog: &Catalog) -> Vec<String> {
        let base = format!("{}.{}", config.name(), self.lookup_module);
        match self.lookup {
            ModuleLookup::Single => vec![base],
            ModuleLookup::Children => catalog
                .child_modules(&base)
                .into_iter()
                .map(|def| def.name())
                .filter(|name| !catalog.is_package(name))
                .filter(|name| {
                    !name
                        .rsplit('.')
                        .next()
                        .is_some_and(|last| last.starts_with('_'))
                })
                .map(str::to_string)
                .collect(),
        }
    }

    /// Index a hook under its configuration.
    pub fn add_hook_impl(&mut self, hook: Hook) -> Result<()> {
        let key = HookKey {
            registry: hook.registry,
            label: hook.label().to_string(),
            name: hook.name.clone(),
        };
        if self.index.contains_key(&key) {
            let bucket: Vec<&str> = self
                .hooks
                .iter()
                .filter(|h| h.registry == key.registry && h.label() == key.label)
                .map(Hook::name)
                .collect();
            return Err(Error::ImproperlyConfigured(format!(
                "'{}' already exists. Duplicates:\n{}",
                key.name,
                bucket.join("\n")
            )));
        }
        tracing::debug!(
            manager = %self.name,
            registry = %key.registry,
            label = %key.label,
            hook = %key.name,
            "hook registered"
        );
        self.index.insert(key, self.hooks.len());
        self.hooks.push(hook);
        Ok(())
    }

    /// Fail unless at least one hook was registered.
    pub fn is_hooked(&self) -> Result<()> {
        if self.hooks.is_empty() {
            return Err(Error::ManagerNotHooked(format!(
                "'{}' does not contain any hooks implementation",
                self.name
            )));
        }
        Ok(())
    }

    /// Every hook, in registration order.
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// Hooks of one configuration, in registration order.
    pub fn get_hooks(&self, config: &Configuration) -> Result<Vec<&Hook>> {
        self.is_hooked()?;
        Ok(self
            .hooks
            .iter()
            .filter(|h| Some(h.registry) == config.registry() && h.label() == config.label())
            .collect())
    }

    pub fn get_hook(&self, config: &Configuration, name: &str) -> Result<Option<&Hook>> {
        self.is_hooked()?;
        let Some(registry) = config.registry() else {
            return Ok(None);
        };
        let key = HookKey {
            registry,
            label: config.label().to_string(),
            name: name.to_string(),
        };
        Ok(self.index.get(&key).map(|&i| &self.hooks[i]))
    }

    /// Labels of the configurations holding a hook named `name`.
    pub fn get_hook_config_holders(&self, name: &str) -> Result<Vec<String>> {
        self.is_hooked()?;
        Ok(self
            .hooks
            .iter()
            .filter(|h| h.name == name)
            .map(|h| h.label().to_string())
            .collect())
    }

    /// Sorted, unique hook names.
    pub fn get_hooks_name(&self) -> Result<Vec<String>> {
        self.is_hooked()?;
        let names: BTreeSet<&str> = self.hooks.iter().map(Hook::name).collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    /// The first hook named `name` among `configs`.
    pub fn first_hook_in<'a, I>(&self, name: &str, configs: I) -> Result<Option<&Hook>>
    where
        I: IntoIterator<Item = &'a Configuration>,
    {
        for config in configs {
            if let Some(hook) = self.get_hook(config, name)? {
                return Ok(Some(hook));
            }
        }
        Ok(None)
    }

    pub(crate) fn hook_not_found(&self, name: &str) -> Error {
        Error::HookNotFound(format!(
            "'{name}' hook was not found in '{}' manager",
            self.name
        ))
    }
}

/// Every manager of a process, in registration order.
#[derive(Debug, Default)]
pub struct ManagerRegistry {
    managers: Vec<Manager>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_manager(&mut self, manager: Manager) -> Result<()> {
        if self.managers.iter().any(|m| m.name == manager.name) {
            return Err(Error::ImproperlyConfigured(format!(
                "Manager names aren't unique. Duplicates:\n{}",
                manager.name
            )));
        }
        tracing::debug!(manager = %manager.name, "manager registered");
        self.managers.push(manager);
        Ok(())
    }

    pub fn get_manager(&self, name: &str) -> Result<&Manager> {
        self.managers
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| self.not_found(name))
    }

    pub fn get_manager_mut(&mut self, name: &str) -> Result<&mut Manager> {
        let not_found = self.not_found(name);
        self.managers
            .iter_mut()
            .find(|m| m.name == name)
            .ok_or(not_found)
    }

    pub fn get_managers(&self) -> &[Manager] {
        &self.managers
    }

    pub fn names(&self) -> Vec<String> {
        self.managers.iter().map(|m| m.name.clone()).collect()
    }

    fn not_found(&self, name: &str) -> Error {
        let choices: Vec<String> = self.names().iter().map(|n| format!("'{n}'")).collect();
        Error::ManagerNotFound(format!(
            "'{name}' does not exist. Choices are:\n[{}]",
            choices.join(", ")
        ))
    }
}
