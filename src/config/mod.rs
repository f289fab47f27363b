use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory with the browser frontend, served for any unmatched path
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            static_dir: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Upper bound on pooled connections; extra acquirers wait in line
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds a request may wait for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Parsed case-insensitively from both the config file and the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl FromStr for SameSitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSitePolicy::Strict),
            "lax" => Ok(SameSitePolicy::Lax),
            "none" => Ok(SameSitePolicy::None),
            other => Err(format!("unknown same-site policy '{}'", other)),
        }
    }
}

impl TryFrom<String> for SameSitePolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Session lifetime in hours, also used as the cookie max-age
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    /// Set the `Secure` attribute; required when serving over TLS
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_same_site")]
    pub same_site: SameSitePolicy,
    /// Interval between sweeps of expired sessions (0 disables the sweep)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_hours: default_ttl_hours(),
            secure: false,
            same_site: default_same_site(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Longest accepted session lifetime (one year)
pub const MAX_TTL_HOURS: u64 = 24 * 365;

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours.min(MAX_TTL_HOURS) as i64)
    }

    /// Cookie max-age, matching the session lifetime
    pub fn cookie_max_age(&self) -> time::Duration {
        time::Duration::hours(self.ttl_hours.min(MAX_TTL_HOURS) as i64)
    }
}

fn default_cookie_name() -> String {
    "mh.sid".to_string()
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_same_site() -> SameSitePolicy {
    SameSitePolicy::Lax
}

fn default_sweep_interval() -> u64 {
    600
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// The single origin allowed to make credentialed cross-origin requests
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    #[serde(default = "default_predictor_url")]
    pub url: String,
    #[serde(default = "default_predictor_timeout")]
    pub timeout_secs: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            url: default_predictor_url(),
            timeout_secs: default_predictor_timeout(),
        }
    }
}

impl PredictorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_predictor_url() -> String {
    "http://127.0.0.1:5001/predict".to_string()
}

fn default_predictor_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        if self.predictor.timeout_secs == 0 {
            bail!("predictor.timeout_secs must be at least 1");
        }
        if self.session.ttl_hours == 0 {
            bail!("session.ttl_hours must be at least 1");
        }
        if self.session.ttl_hours > MAX_TTL_HOURS {
            bail!("session.ttl_hours must be at most {}", MAX_TTL_HOURS);
        }
        if self.session.cookie_name.is_empty() {
            bail!("session.cookie_name must not be empty");
        }
        // Browsers drop SameSite=None cookies that are not also Secure
        if self.session.same_site == SameSitePolicy::None && !self.session.secure {
            bail!("session.same_site = \"none\" requires session.secure = true");
        }
        if let Some(origin) = &self.cors.allowed_origin {
            axum::http::HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid cors.allowed_origin: {}", origin))?;
        }
        reqwest::Url::parse(&self.predictor.url)
            .with_context(|| format!("Invalid predictor.url: {}", self.predictor.url))?;
        Ok(())
    }
}
