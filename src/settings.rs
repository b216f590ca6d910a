//! Service settings
//!
//! Everything is read from environment variables (optionally loaded from a
//! `.env` file by `main`). Parsing goes through a lookup closure so tests can
//! feed values without touching the process environment.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable names
const ENV_APP_NAME: &str = "APP_NAME";
const ENV_APP_DESCRIPTION: &str = "APP_DESCRIPTION";
const ENV_DEBUG: &str = "DEBUG";
const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_WAX_RPC_URL: &str = "WAX_RPC_URL";
const ENV_WAX_LABS_CONTRACT_ACCOUNT: &str = "WAX_LABS_CONTRACT_ACCOUNT";
const ENV_WAX_REQUEST_TIMEOUT: &str = "WAX_REQUEST_TIMEOUT_SECS";
const ENV_STATUS_POLL_INTERVAL: &str = "STATUS_POLL_INTERVAL_SECS";
const ENV_PROPOSAL_CACHE_TTL: &str = "PROPOSAL_CACHE_TTL_SECS";
const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
const ENV_TELEGRAM_API_URL: &str = "TELEGRAM_API_URL";
const ENV_CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";

const DEFAULT_APP_NAME: &str = "wax-labs-notifications";
const DEFAULT_APP_DESCRIPTION: &str = "Telegram notifications for WAX Labs proposals";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_WAX_RPC_URL: &str = "https://wax.greymass.com";
const DEFAULT_WAX_LABS_CONTRACT_ACCOUNT: &str = "labs.decide";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_WAX_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATUS_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_PROPOSAL_CACHE_TTL_SECS: u64 = 30;

#[derive(Debug)]
pub enum SettingsError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Missing(key) => write!(f, "{} must be set", key),
            SettingsError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// The WAX Labs contract the queries read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractConfig {
    /// Contract account; also used as the table scope for proposals
    pub account: String,
}

impl ContractConfig {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }
}

/// Tables of the WAX Labs contract read by this service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tables {
    Proposals,
    Deliverables,
}

impl Tables {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tables::Proposals => "proposals",
            Tables::Deliverables => "deliverables",
        }
    }
}

impl std::fmt::Display for Tables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub app_description: String,
    pub app_version: &'static str,
    pub debug: bool,
    pub log_level: Option<String>,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub wax_rpc_url: String,
    pub contract: ContractConfig,
    pub wax_request_timeout: Duration,
    pub status_poll_interval: Duration,
    pub proposal_cache_ttl: Duration,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,
    pub cors_allowed_origins: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get(ENV_DATABASE_URL).ok_or(SettingsError::Missing(ENV_DATABASE_URL))?;

        let bind_addr_raw = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|_| SettingsError::Invalid {
                key: ENV_BIND_ADDR,
                value: bind_addr_raw.clone(),
            })?;

        let debug = match get(ENV_DEBUG) {
            Some(v) => parse_bool(ENV_DEBUG, &v)?,
            None => false,
        };

        let cors_allowed_origins = get(ENV_CORS_ALLOWED_ORIGINS)
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            app_name: get(ENV_APP_NAME).unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            app_description: get(ENV_APP_DESCRIPTION)
                .unwrap_or_else(|| DEFAULT_APP_DESCRIPTION.to_string()),
            app_version: env!("CARGO_PKG_VERSION"),
            debug,
            log_level: get(ENV_LOG_LEVEL),
            database_url,
            bind_addr,
            wax_rpc_url: get(ENV_WAX_RPC_URL)
                .unwrap_or_else(|| DEFAULT_WAX_RPC_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            contract: ContractConfig::new(
                get(ENV_WAX_LABS_CONTRACT_ACCOUNT)
                    .unwrap_or_else(|| DEFAULT_WAX_LABS_CONTRACT_ACCOUNT.to_string()),
            ),
            wax_request_timeout: parse_secs(
                ENV_WAX_REQUEST_TIMEOUT,
                get(ENV_WAX_REQUEST_TIMEOUT),
                DEFAULT_WAX_REQUEST_TIMEOUT_SECS,
            )?,
            status_poll_interval: parse_secs(
                ENV_STATUS_POLL_INTERVAL,
                get(ENV_STATUS_POLL_INTERVAL),
                DEFAULT_STATUS_POLL_INTERVAL_SECS,
            )?,
            proposal_cache_ttl: parse_secs(
                ENV_PROPOSAL_CACHE_TTL,
                get(ENV_PROPOSAL_CACHE_TTL),
                DEFAULT_PROPOSAL_CACHE_TTL_SECS,
            )?,
            telegram_bot_token: get(ENV_TELEGRAM_BOT_TOKEN),
            telegram_api_url: get(ENV_TELEGRAM_API_URL)
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            cors_allowed_origins,
        })
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        match (&self.log_level, self.debug) {
            (Some(level), _) => level.to_lowercase(),
            (None, true) => "info,wax_labs_notifications=debug".to_string(),
            (None, false) => "info".to_string(),
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_secs(key: &'static str, value: Option<String>, default: u64) -> Result<Duration, SettingsError> {
    let secs = match value {
        Some(v) => v.trim().parse::<u64>().map_err(|_| SettingsError::Invalid {
            key,
            value: v.clone(),
        })?,
        None => default,
    };

    if secs == 0 {
        return Err(SettingsError::Invalid {
            key,
            value: "0".to_string(),
        });
    }

    Ok(Duration::from_secs(secs))
}
