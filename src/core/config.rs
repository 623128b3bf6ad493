use crate::core::window::MAX_WINDOW_DAYS;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_CBR_URL: &str = "https://www.cbr-xml-daily.ru";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CbrProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub cbr: Option<CbrProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            cbr: Some(CbrProviderConfig {
                base_url: DEFAULT_CBR_URL.to_string(),
            }),
        }
    }
}

fn default_base_currency() -> String {
    "RUB".to_string()
}

fn default_window_days() -> i64 {
    30
}

fn default_max_page_size() -> u32 {
    100
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// SQLite database holding the financial records.
    pub database_path: Option<String>,
    /// Pivot currency of the rate feed.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Currency reports are normalized into when the caller asks for none.
    #[serde(default)]
    pub reporting_currency: String,
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "finhealth", "finhealth")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.database_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "finhealth", "finhealth")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("finhealth.db"))
    }

    pub fn cbr_base_url(&self) -> &str {
        self.providers
            .cbr
            .as_ref()
            .map_or(DEFAULT_CBR_URL, |p| &p.base_url)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.default_window_days) {
            bail!(
                "default_window_days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS,
                self.default_window_days
            );
        }
        Ok(())
    }
}
