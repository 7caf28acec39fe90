/// Application configuration
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use smm_client::ServerConfig;
use smm_sync::{Category, DownloadPlan, Layout};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file read when no `--config` path is given
pub const DEFAULT_CONFIG_FILE: &str = "smm.toml";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host name or IP of the smm server; the port is fixed
    #[serde(default)]
    pub address: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding `<category>.m3u` and the song trees
    #[serde(default = "default_playlist_root")]
    pub playlist_root: PathBuf,

    /// Directory holding cursors, notes and the download log
    #[serde(default = "default_smm_root")]
    pub smm_root: PathBuf,

    /// Player-private position cache; defaults to `<smm_root>/.positions.json`
    #[serde(default)]
    pub position_cache: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(default = "default_min_remaining")]
    pub min_remaining: usize,

    #[serde(default)]
    pub seed: Option<u32>,

    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a file and `SMM_*` environment variables.
    ///
    /// An explicit `path` must exist; otherwise `smm.toml` in the working
    /// directory is read when present. Environment variables use `__` between
    /// sections, e.g. `SMM_SERVER__ADDRESS`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    builder = builder.add_source(config::File::from(default));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SMM")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("download.categories"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values that do not depend on the command run
    pub fn validate(&self) -> Result<()> {
        if self.download.count == 0 {
            return Err(CliError::Config("download.count must be > 0".into()));
        }

        if self.download.interval_hours == 0 {
            return Err(CliError::Config(
                "download.interval_hours must be > 0".into(),
            ));
        }

        if self.server.connect_timeout_secs == 0 {
            return Err(CliError::Config(
                "server.connect_timeout_secs must be > 0".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(CliError::Config(format!(
                "log.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log.level
            )));
        }

        self.categories()?;
        Ok(())
    }

    /// Server connection settings; fails when no address is configured.
    pub fn server_config(&self) -> Result<ServerConfig> {
        if self.server.address.trim().is_empty() {
            return Err(CliError::Config(
                "server.address is required (set it in smm.toml or SMM_SERVER__ADDRESS)".into(),
            ));
        }

        Ok(ServerConfig::from_address(&self.server.address)
            .with_connect_timeout(Duration::from_secs(self.server.connect_timeout_secs)))
    }

    pub fn layout(&self) -> Layout {
        Layout::new(
            self.storage.playlist_root.clone(),
            self.storage.smm_root.clone(),
        )
    }

    pub fn position_cache_path(&self) -> PathBuf {
        self.storage
            .position_cache
            .clone()
            .unwrap_or_else(|| self.storage.smm_root.join(".positions.json"))
    }

    /// Configured categories, validated
    pub fn categories(&self) -> Result<Vec<Category>> {
        self.download
            .categories
            .iter()
            .map(|name| Category::new(name.as_str()).map_err(CliError::from))
            .collect()
    }

    pub fn download_plan(&self) -> DownloadPlan {
        DownloadPlan {
            count: self.download.count,
            min_remaining: self.download.min_remaining,
            seed: self.download.seed,
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.download.interval_hours * 60 * 60)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            playlist_root: default_playlist_root(),
            smm_root: default_smm_root(),
            position_cache: None,
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            count: default_count(),
            min_remaining: default_min_remaining(),
            seed: None,
            interval_hours: default_interval_hours(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_connect_timeout() -> u64 {
    smm_client::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_playlist_root() -> PathBuf {
    PathBuf::from("./music")
}

fn default_smm_root() -> PathBuf {
    PathBuf::from("./music/smm")
}

fn default_categories() -> Vec<String> {
    vec!["vocal".to_string(), "instrumental".to_string()]
}

fn default_count() -> u32 {
    20
}

fn default_min_remaining() -> usize {
    10
}

fn default_interval_hours() -> u64 {
    24
}

fn default_log_level() -> String {
    "info".to_string()
}
