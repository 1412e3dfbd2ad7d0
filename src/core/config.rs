use crate::providers::filter_mapping::FieldCatalog;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the Hydra API, e.g. `https://example.com/api`.
    pub url: String,
    /// Host serving `/login-proxy`. Defaults to `url`.
    pub auth_url: Option<String>,
}

impl ApiConfig {
    pub fn auth_url(&self) -> &str {
        self.auth_url.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { persist: true }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListConfig {
    pub items_per_page: u32,
}

impl Default for ListConfig {
    fn default() -> Self {
        ListConfig { items_per_page: 10 }
    }
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub filters: FieldCatalog,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "folio", "folio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "folio", "folio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
