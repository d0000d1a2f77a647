use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::render::RenderSettings;

pub const DEFAULT_CONFIG_FILE: &str = "dashwall.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashwallConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    /// Seconds a composed view waits for its socket before it is torn down.
    #[serde(default = "default_view_ttl_secs")]
    pub view_ttl_secs: u64,
    #[serde(default = "default_flush_ms")]
    pub flush_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            view_ttl_secs: default_view_ttl_secs(),
            flush_ms: default_flush_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    #[serde(default = "default_clock_tick_ms")]
    pub clock_tick_ms: u64,
    #[serde(default = "default_calendar_refresh_secs")]
    pub calendar_refresh_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_ms: default_frame_ms(),
            clock_tick_ms: default_clock_tick_ms(),
            calendar_refresh_secs: default_calendar_refresh_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrencyConfig {
    #[serde(default = "default_currency_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_currency_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_currency_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            endpoint: default_currency_endpoint(),
            refresh_secs: default_currency_refresh_secs(),
            timeout_secs: default_currency_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_view_ttl_secs() -> u64 {
    60
}

fn default_flush_ms() -> u64 {
    100
}

fn default_store_path() -> PathBuf {
    PathBuf::from("dashboards.json")
}

fn default_frame_ms() -> u64 {
    16
}

fn default_clock_tick_ms() -> u64 {
    1000
}

fn default_calendar_refresh_secs() -> u64 {
    24 * 60 * 60
}

fn default_currency_endpoint() -> String {
    "https://api.example.invalid/history".to_string()
}

fn default_currency_refresh_secs() -> u64 {
    300
}

fn default_currency_timeout_secs() -> u64 {
    10
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl DashwallConfig {
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.flush_ms == 0 {
            return Err(ConfigError::Invalid("server.flush_ms must be positive".to_string()));
        }
        if self.render.frame_ms == 0 || self.render.clock_tick_ms == 0 {
            return Err(ConfigError::Invalid("render periods must be positive".to_string()));
        }
        if self.render.calendar_refresh_secs == 0 || self.currency.refresh_secs == 0 {
            return Err(ConfigError::Invalid("refresh periods must be positive".to_string()));
        }
        if url::Url::parse(&self.currency.endpoint).is_err() {
            return Err(ConfigError::Invalid(format!(
                "currency.endpoint `{}` is not a URL",
                self.currency.endpoint
            )));
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            frame: Duration::from_millis(self.render.frame_ms),
            clock_tick: Duration::from_millis(self.render.clock_tick_ms),
            calendar_refresh: Duration::from_secs(self.render.calendar_refresh_secs),
            currency_refresh: Duration::from_secs(self.currency.refresh_secs),
        }
    }

    pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .address
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.address `{}` is not host:port", self.server.address)))
    }

    pub fn view_ttl(&self) -> Duration {
        Duration::from_secs(self.server.view_ttl_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.server.flush_ms)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.currency.timeout_secs)
    }

    /// Resolves a relative store path against the directory holding the
    /// config file.
    pub fn store_path(&self, config_dir: Option<&Path>) -> PathBuf {
        match config_dir {
            Some(dir) if self.store.path.is_relative() => dir.join(&self.store.path),
            _ => self.store.path.clone(),
        }
    }
}

/// Reads `path`, or returns defaults when `path` is `None` and no
/// `dashwall.toml` exists in the working directory.
pub fn load(path: Option<&Path>) -> Result<DashwallConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(DashwallConfig::default());
            }
            fallback
        }
    };
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    DashwallConfig::from_toml(&text, &path)
}
