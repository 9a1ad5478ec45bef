//! [`TestSocon`] builder and on-disk settings files.

use std::fs;
use std::path::{Path, PathBuf};

use socon_core::{ACTIVE_PROJECT_VARIABLE, Catalog, Environ, Socon};
use tempfile::TempDir;

use crate::catalog::{SETTINGS_MODULE, fixture_catalog};

/// Environment variable naming the settings module.
pub const SETTINGS_VARIABLE: &str = "SOCON_SETTINGS_MODULE";

/// Builds [`Socon`] handles over the fixture catalog.
///
/// # Example
///
/// ```rust,no_run
/// use socon_test_utils::TestSocon;
///
/// let socon = TestSocon::new().active_project("manager").setup();
/// assert!(socon.settings_configured());
/// ```
#[derive(Debug, Clone)]
pub struct TestSocon {
    catalog: Catalog,
    env: Environ,
}

impl Default for TestSocon {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSocon {
    /// Fixture catalog with `common.settings` as settings module.
    pub fn new() -> Self {
        Self::unconfigured().env(SETTINGS_VARIABLE, SETTINGS_MODULE)
    }

    /// Fixture catalog and an empty environment.
    pub fn unconfigured() -> Self {
        Self {
            catalog: fixture_catalog(),
            env: Environ::new(),
        }
    }

    /// Register extra modules.
    pub fn modules(mut self, catalog: Catalog) -> Self {
        self.catalog.merge(catalog);
        self
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.env.set(name, value);
        self
    }

    pub fn settings_module(self, module: &str) -> Self {
        self.env(SETTINGS_VARIABLE, module)
    }

    pub fn active_project(self, label: &str) -> Self {
        self.env(ACTIVE_PROJECT_VARIABLE, label)
    }

    /// The handle, before setup.
    pub fn build(self) -> Socon {
        Socon::with_env(self.catalog, self.env).expect("TestSocon::build: invalid catalog")
    }

    /// The handle, with registries populated from the settings.
    pub fn setup(self) -> Socon {
        self.setup_result().expect("TestSocon::setup: setup failed")
    }

    /// Like [`TestSocon::setup`], returning the setup error.
    pub fn setup_result(self) -> socon_core::Result<Socon> {
        let mut socon = self.build();
        socon.setup()?;
        Ok(socon)
    }
}

/// A TOML settings file in a temporary directory.
pub struct SettingsFile {
    _dir: TempDir,
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(content: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, content).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path as a settings module identifier.
    pub fn module(&self) -> String {
        self.path.display().to_string()
    }
}
