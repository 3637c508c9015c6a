use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrationError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "CRM_MIGRATE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub server: ServerConfig,
    pub identity: IdentityConfig,
}

/// Input and output locations for both datasets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub companies_input: PathBuf,
    pub companies_output: PathBuf,
    pub contacts_input: PathBuf,
    pub contacts_output: PathBuf,
    pub region_table: PathBuf,
    pub company_table: PathBuf,
    pub log_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            companies_input: PathBuf::from("data/raw/Companies_2026_02_10.csv"),
            companies_output: PathBuf::from("data/processed/companies.csv"),
            contacts_input: PathBuf::from("data/raw/Contacts_2026_02_12.csv"),
            contacts_output: PathBuf::from("data/processed/peoples.csv"),
            region_table: PathBuf::from("data/twenty_data/inheadenRegion.csv"),
            company_table: PathBuf::from("data/twenty_data/company.csv"),
            log_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Domain appended to emails derived from owner names.
    pub email_domain: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            email_domain: "inheaden.io".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// An explicitly requested file must exist. When no path is given the
    /// `CRM_MIGRATE_CONFIG` variable is consulted, then `config.toml`; a
    /// missing default file yields the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(from_env) = std::env::var(CONFIG_PATH_ENV) {
            if !from_env.trim().is_empty() {
                return Self::from_file(Path::new(from_env.trim()));
            }
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MigrationError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| {
            MigrationError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
