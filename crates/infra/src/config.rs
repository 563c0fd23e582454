//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CRON_SECRET: &str = "dev-cron-secret";
pub const DEFAULT_ADMIN_SECRET: &str = "dev-admin-secret";
pub const DEFAULT_EXTENSION_SECRET: &str = "dev-extension-secret";
pub const DEFAULT_PINTEREST_API_BASE: &str = "https://api.pinterest.com/v5";
pub const DEFAULT_PINTEREST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings for the Pinterest v5 client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinterestConfig {
    /// Base URL without a trailing slash.
    pub api_base: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout: Duration,
}

impl Default for PinterestConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_PINTEREST_API_BASE.to_string(),
            client_id: None,
            client_secret: None,
            timeout: Duration::from_secs(DEFAULT_PINTEREST_TIMEOUT_SECS),
        }
    }
}

/// Browser extensions allowed to submit signed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConfig {
    pub allowed_ids: Vec<String>,
    /// HMAC-SHA256 key shared with the extensions.
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory stores.
    pub database_url: Option<String>,
    pub cron_secret: String,
    /// Bearer secret guarding credential linking and deletes.
    pub admin_secret: String,
    pub extension: ExtensionConfig,
    pub pinterest: PinterestConfig,
    /// When set, the job also runs in-process on this cadence.
    pub dispatch_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let cron_secret = var("CRON_SECRET").unwrap_or_else(|| {
            warn!("CRON_SECRET not set; using insecure development default");
            DEFAULT_CRON_SECRET.to_string()
        });

        let admin_secret = var("ADMIN_SECRET").unwrap_or_else(|| {
            warn!("ADMIN_SECRET not set; using insecure development default");
            DEFAULT_ADMIN_SECRET.to_string()
        });

        let extension = ExtensionConfig {
            allowed_ids: var("ALLOWED_EXTENSION_IDS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            secret: var("CHROME_EXTENSION_SECRET").unwrap_or_else(|| {
                warn!("CHROME_EXTENSION_SECRET not set; using insecure development default");
                DEFAULT_EXTENSION_SECRET.to_string()
            }),
        };

        let api_base = var("PINTEREST_API_BASE")
            .unwrap_or_else(|| DEFAULT_PINTEREST_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&api_base).map_err(|e| ConfigError::Invalid {
            name: "PINTEREST_API_BASE",
            reason: e.to_string(),
        })?;

        let timeout = match var("PINTEREST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_secs("PINTEREST_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_PINTEREST_TIMEOUT_SECS),
        };

        let dispatch_interval = var("DISPATCH_INTERVAL_SECS")
            .map(|raw| parse_secs("DISPATCH_INTERVAL_SECS", &raw).map(Duration::from_secs))
            .transpose()?;

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            cron_secret,
            admin_secret,
            extension,
            pinterest: PinterestConfig {
                api_base,
                client_id: var("PINTEREST_CLIENT_ID"),
                client_secret: var("PINTEREST_CLIENT_SECRET"),
                timeout,
            },
            dispatch_interval,
        })
    }
}

fn parse_secs(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
