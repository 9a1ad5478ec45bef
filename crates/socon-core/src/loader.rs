//! Module catalog
//!
//! The catalog is the explicit module namespace configurations, managers
//! and hooks are discovered from. Each [`ModuleDef`] is keyed by a dotted
//! name and carries attributes plus an optional init routine. The init
//! routine is where a module *declares* managers and hooks; nothing is
//! registered until the module is imported through a
//! [`Socon`](crate::Socon) handle.
//!
//! ```text
//!   blog                       (namespace, path = /srv/blog)
//!   blog.projects              (config classes)
//!   blog.managers              (init: declares managers)
//!   blog.management.commands.* (init: declares hooks)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use socon_conf::SettingsModule;

use crate::manager::{HookDef, ManagerDef};
use crate::registry::{ConfigClass, ConfigKind};
use crate::{Error, Result};

/// A routine run once when its module is imported.
pub type InitFn = Arc<dyn Fn(&mut ModuleScope) -> Result<()> + Send + Sync>;

/// A callable attribute receiving a TOML payload.
pub type CallableFn = Arc<dyn Fn(&toml::Value) -> Result<()> + Send + Sync>;

/// An attribute of a module.
#[derive(Clone)]
pub enum Attr {
    /// A plain value, eligible as a setting when upper-case.
    Value(toml::Value),
    /// An alias to another module.
    Module(String),
    /// A configuration class.
    Config(ConfigClass),
    /// A callable, e.g. a logging configurator.
    Callable(CallableFn),
    /// Any other named type.
    Class(String),
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Module(m) => f.debug_tuple("Module").field(m).finish(),
            Self::Config(c) => f.debug_tuple("Config").field(c).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Class(c) => f.debug_tuple("Class").field(c).finish(),
        }
    }
}

/// Definition of a single module.
#[derive(Clone)]
pub struct ModuleDef {
    name: String,
    path: Option<PathBuf>,
    attrs: Vec<(String, Attr)>,
    init: Option<InitFn>,
    implicit: bool,
}

impl fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDef")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("attrs", &self.attrs)
            .field("init", &self.init.is_some())
            .finish()
    }
}

impl ModuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            attrs: Vec::new(),
            init: None,
            implicit: false,
        }
    }

    fn namespace(name: &str) -> Self {
        Self {
            implicit: true,
            ..Self::new(name)
        }
    }

    /// Filesystem location of the module.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.attrs.push((key.into(), Attr::Value(value.into())));
        self
    }

    pub fn module_attr(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.attrs.push((key.into(), Attr::Module(target.into())));
        self
    }

    /// Define a configuration class in this module.
    pub fn config(mut self, class: ConfigClass) -> Self {
        let class = class.defined_in(&self.name);
        self.attrs
            .push((class.class_name().to_string(), Attr::Config(class)));
        self
    }

    pub fn callable<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&toml::Value) -> Result<()> + Send + Sync + 'static,
    {
        self.attrs.push((key.into(), Attr::Callable(Arc::new(f))));
        self
    }

    pub fn class(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.attrs.push((key.clone(), Attr::Class(key)));
        self
    }

    /// The routine declaring this module's managers and hooks.
    pub fn init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ModuleScope) -> Result<()> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn explicit_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn attr(&self, key: &str) -> Option<&Attr> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, a)| a)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Attr)> {
        self.attrs.iter().map(|(k, a)| (k.as_str(), a))
    }

    pub fn init_fn(&self) -> Option<&InitFn> {
        self.init.as_ref()
    }

    /// Configuration classes usable by a registry of `kind`, sorted by name.
    pub fn config_classes(&self, kind: ConfigKind) -> Vec<&ConfigClass> {
        let mut classes: Vec<&ConfigClass> = self
            .attrs
            .iter()
            .filter_map(|(_, attr)| match attr {
                Attr::Config(class) if kind.accepts(class.kind()) => Some(class),
                _ => None,
            })
            .collect();
        classes.sort_by(|a, b| a.class_name().cmp(b.class_name()));
        classes
    }
}

/// Something a module declares while being imported.
#[derive(Debug, Clone)]
pub enum Declaration {
    Manager(ManagerDef),
    Hook(HookDef),
}

/// Collects the declarations of a module being imported.
#[derive(Debug)]
pub struct ModuleScope {
    module: String,
    declarations: Vec<Declaration>,
}

impl ModuleScope {
    pub(crate) fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            declarations: Vec::new(),
        }
    }

    /// Fully qualified name of the module being imported.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Declare a manager.
    pub fn manager(&mut self, def: ManagerDef) -> &mut Self {
        self.declarations.push(Declaration::Manager(def));
        self
    }

    /// Declare a hook implementation.
    pub fn hook(&mut self, def: impl Into<HookDef>) -> &mut Self {
        self.declarations.push(Declaration::Hook(def.into()));
        self
    }

    pub(crate) fn into_declarations(self) -> Vec<Declaration> {
        self.declarations
    }
}

/// The set of modules known to a process.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    modules: BTreeMap<String, ModuleDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, creating namespace parents as needed.
    ///
    /// An explicit definition replaces an earlier one with the same name.
    pub fn register(&mut self, def: ModuleDef) -> &mut Self {
        let mut parent = def.name.as_str();
        while let Some((head, _)) = parent.rsplit_once('.') {
            self.modules
                .entry(head.to_string())
                .or_insert_with(|| ModuleDef::namespace(head));
            parent = head;
        }
        if def.implicit && self.modules.contains_key(&def.name) {
            return self;
        }
        self.modules.insert(def.name.clone(), def);
        self
    }

    /// Builder-style [`Catalog::register`].
    pub fn with(mut self, def: ModuleDef) -> Self {
        self.register(def);
        self
    }

    /// Register every module of `other`.
    pub fn merge(&mut self, other: Catalog) -> &mut Self {
        for def in other.modules.into_values() {
            self.register(def);
        }
        self
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDef> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Direct children of `name`, sorted.
    pub fn child_modules(&self, name: &str) -> Vec<&ModuleDef> {
        let prefix = format!("{name}.");
        self.modules
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('.'))
            .map(|(_, def)| def)
            .collect()
    }

    /// Whether other modules are nested under `name`.
    pub fn is_package(&self, name: &str) -> bool {
        let prefix = format!("{name}.");
        self.modules
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Filesystem location of `name`, derived from the nearest ancestor with
    /// an explicit path.
    pub fn module_path(&self, name: &str) -> Option<PathBuf> {
        let mut head = name;
        let mut tail: Vec<&str> = Vec::new();
        loop {
            if let Some(path) = self.module(head).and_then(ModuleDef::explicit_path) {
                let mut path = path.to_path_buf();
                path.extend(tail.iter().rev());
                return Some(path);
            }
            let (parent, last) = head.rsplit_once('.')?;
            tail.push(last);
            head = parent;
        }
    }

    /// Resolve `module.attr`.
    pub fn import_string(&self, dotted_path: &str) -> Result<&Attr> {
        let (module_path, attr) = dotted_path.rsplit_once('.').ok_or_else(|| {
            Error::Import(format!("{dotted_path} doesn't look like a module path"))
        })?;
        let module = self
            .module(module_path)
            .ok_or_else(|| Error::Import(format!("No module named '{module_path}'")))?;
        module.attr(attr).ok_or_else(|| {
            Error::Import(format!(
                "Module \"{module_path}\" does not define a \"{attr}\" attribute/class"
            ))
        })
    }

    /// Load a settings module: a TOML file when `name` ends in `.toml`,
    /// otherwise the value attributes of a catalog module.
    pub fn load_settings_module(&self, name: &str) -> socon_conf::Result<SettingsModule> {
        if name.ends_with(".toml") {
            let path = Path::new(name);
            if path.is_file() {
                return SettingsModule::from_file(path);
            }
        }
        let module = self
            .module(name)
            .ok_or_else(|| socon_conf::Error::Import(format!("No module named '{name}'")))?;
        let mut settings = SettingsModule::new(name);
        for (key, attr) in module.attrs() {
            match attr {
                Attr::Value(value) => {
                    settings = settings.with_value(key, value.clone());
                }
                Attr::Module(target) => {
                    settings = settings.with_module(key, target.as_str());
                }
                _ => {}
            }
        }
        Ok(settings)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
