//! Bot configuration.
//!
//! Values come from an optional TOML file and are overridden by environment
//! variables (a `.env` file is loaded into the environment at start-up):
//!
//! ```toml
//! token = "123456:ABC..."
//! allowed_users = [11111111, 22222222]
//!
//! [monitoring]
//! enabled = true
//! interval = 300
//! ```

use std::num::NonZeroU64;
use std::time::Duration;

use crate::notify::OperatorId;

pub const ENV_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_ALLOWED_USERS: &str = "ALLOWED_USER_IDS";
pub const ENV_MONITORING_ENABLED: &str = "ENABLE_MONITORING";
pub const ENV_MONITORING_INTERVAL: &str = "MONITORING_INTERVAL";

fn default_interval() -> NonZeroU64 {
    NonZeroU64::new(300).unwrap_or(NonZeroU64::MIN)
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between two monitoring cycles.
    #[serde(default = "default_interval")]
    pub interval: NonZeroU64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_interval(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct BotConfigFile {
    token: Option<String>,
    #[serde(default)]
    allowed_users: Vec<OperatorId>,
    #[serde(default)]
    monitoring: MonitoringConfig,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub allowed_users: Vec<OperatorId>,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no bot token configured (TELEGRAM_BOT_TOKEN)")]
    MissingToken,
    #[error("no authorized users configured (ALLOWED_USER_IDS)")]
    NoOperators,
    #[error("invalid user id {0:?}")]
    InvalidOperatorId(String),
    #[error("invalid monitoring interval {0:?}: expected a positive number of seconds")]
    InvalidInterval(String),
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.get())
    }
}

impl BotConfig {
    /// Build the configuration from TOML text and an environment lookup.
    fn try_init_from_string(
        config: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut file: BotConfigFile = toml::from_str(config)?;

        if let Some(token) = env(ENV_TOKEN) {
            file.token = Some(token);
        }
        if let Some(users) = env(ENV_ALLOWED_USERS) {
            file.allowed_users = users
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse()
                        .map_err(|_| ConfigError::InvalidOperatorId(id.to_string()))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(enabled) = env(ENV_MONITORING_ENABLED) {
            file.monitoring.enabled = enabled.trim().eq_ignore_ascii_case("true");
        }
        if let Some(interval) = env(ENV_MONITORING_INTERVAL) {
            file.monitoring.interval = interval
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidInterval(interval.clone()))?;
        }

        let token = file
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        if file.allowed_users.is_empty() {
            return Err(ConfigError::NoOperators);
        }

        Ok(Self {
            token,
            allowed_users: file.allowed_users,
            monitoring: file.monitoring,
        })
    }

    /// Load the file named on the command line (a missing file counts as
    /// empty) and apply the process environment on top.
    pub fn try_init() -> Result<Self, ConfigError> {
        let path = &crate::cli::get_cli_args().config;
        let config = match std::fs::read_to_string(path) {
            Ok(config) => config,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config file at {path:?}, using environment only");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        Self::try_init_from_string(&config, |key| std::env::var(key).ok())
    }
}
