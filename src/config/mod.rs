//! Application configuration.

mod migration;

pub use migration::Migrate;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default inter-request delay bounds for a provider, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Per-provider rate-limit configuration, overridable from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub family_search: DelayRange,
    pub ancestry: DelayRange,
    pub wiki_tree: DelayRange,
    pub twenty_three_and_me: DelayRange,
}

impl ProviderConfig {
    /// Looks up the configured delay range for a provider by name, falling back to
    /// `family_search`'s defaults for an unrecognized provider string.
    pub fn delay_for(&self, provider: &str) -> DelayRange {
        match provider {
            "ancestry" => self.ancestry,
            "wiki_tree" => self.wiki_tree,
            "twenty_three_and_me" => self.twenty_three_and_me,
            _ => self.family_search,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            family_search: DelayRange { min_ms: 500, max_ms: 1500 },
            ancestry: DelayRange { min_ms: 1000, max_ms: 3000 },
            wiki_tree: DelayRange { min_ms: 500, max_ms: 1500 },
            twenty_three_and_me: DelayRange { min_ms: 1000, max_ms: 3000 },
        }
    }
}

/// Geocoder configuration (Nominatim-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub min_request_interval_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "kinmap-core/0.1".to_string(),
            min_request_interval_ms: 1100,
        }
    }
}

/// Top-level application configuration, persisted as `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: u32,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub providers: ProviderConfig,
    pub geocoder: GeocoderConfig,
}

impl AppConfig {
    const FILE_NAME: &'static str = "config.toml";

    /// Load configuration from `data_dir`, creating it with defaults if absent.
    pub fn load_or_create(data_dir: &PathBuf) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if config_path.exists() {
            info!("Loading config from {:?}", config_path);
            let contents = fs::read_to_string(&config_path)?;
            let mut config: AppConfig = toml::from_str(&contents)?;

            if config.needs_migration() {
                info!(
                    "Migrating config from v{} to v{}",
                    config.version,
                    Self::target_version()
                );
                config.migrate()?;
                config.save()?;
            }

            Ok(config)
        } else {
            warn!("No config found, creating default at {:?}", config_path);
            let config = Self::default_with_dir(data_dir.clone());
            config.save()?;
            Ok(config)
        }
    }

    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        Self {
            version: Self::target_version(),
            data_dir,
            log_level: "info".to_string(),
            providers: ProviderConfig::default(),
            geocoder: GeocoderConfig::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let config_path = self.data_dir.join(Self::FILE_NAME);
        let contents = toml::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;
        Ok(())
    }

    pub fn provider_cache_dir(&self) -> PathBuf {
        self.data_dir.join("provider-cache")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(self.provider_cache_dir())?;
        fs::create_dir_all(self.blob_dir())?;
        Ok(())
    }
}

impl Migrate for AppConfig {
    fn current_version(&self) -> u32 {
        self.version
    }

    fn target_version() -> u32 {
        1
    }

    fn migrate(&mut self) -> Result<()> {
        match self.version {
            0 => {
                self.version = 1;
                Ok(())
            }
            1 => Ok(()),
            v => Err(anyhow!("unknown config version: {}", v)),
        }
    }
}
