use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docfields::{Engine, EngineConfig, TypeRegistry};

/// Settings resolved from the config file and command-line overrides.
pub struct CliContext {
    config_path: PathBuf,
    pub config: EngineConfig,
}

impl CliContext {
    /// Loads `config_path` if it exists; `database` overrides `[database].path`.
    pub fn load(config_path: &Path, database: Option<PathBuf>) -> Result<Self> {
        let mut config = EngineConfig::load_or_default(config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
        if let Some(database) = database {
            config.database.path = database;
        }
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
        })
    }

    /// The config file in effect, or `None` when defaults were used.
    pub fn config_file(&self) -> Option<&Path> {
        self.config_path.is_file().then_some(self.config_path.as_path())
    }

    pub fn database_path(&self) -> &Path {
        &self.config.database.path
    }

    /// Opens the database and applies pending migrations.
    pub fn open_engine(&self) -> Result<Engine> {
        Engine::open(self.config.clone(), TypeRegistry::with_builtin_types())
            .with_context(|| format!("Failed to open database {}", self.database_path().display()))
    }
}
