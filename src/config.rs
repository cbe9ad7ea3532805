//! Environment configuration

use crate::transport::telegram::API_BASE_URL_DEFAULT;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_WIZARD_IDLE_SECS: u64 = 900;
const DEFAULT_ACTOR_IDLE_SECS: u64 = 600;
const DEFAULT_NOTIFY_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Bot configuration
#[derive(Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub api_base_url: String,
    pub db_path: PathBuf,
    /// Serve the webhook on this address instead of long polling
    pub webhook_addr: Option<SocketAddr>,
    pub webhook_secret: Option<String>,
    /// Where uploaded documents are saved; not saved when unset
    pub upload_dir: Option<PathBuf>,
    pub wizard_idle: Duration,
    pub actor_idle: Duration,
    /// `None` disables reminders
    pub notify_interval: Option<Duration>,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("db_path", &self.db_path)
            .field("webhook_addr", &self.webhook_addr)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("upload_dir", &self.upload_dir)
            .field("wizard_idle", &self.wizard_idle)
            .field("actor_idle", &self.actor_idle)
            .field("notify_interval", &self.notify_interval)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let db_path = get("TASKBOT_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.taskbot/tasks.db"))
            },
            PathBuf::from,
        );

        let webhook_addr = get("TASKBOT_WEBHOOK_ADDR")
            .map(|value| {
                value.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                    var: "TASKBOT_WEBHOOK_ADDR",
                    value,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let notify_secs = seconds(&get, "TASKBOT_NOTIFY_INTERVAL_SECS", DEFAULT_NOTIFY_INTERVAL_SECS)?;

        Ok(Self {
            bot_token,
            api_base_url: get("TELEGRAM_API_BASE_URL")
                .unwrap_or_else(|| API_BASE_URL_DEFAULT.to_string()),
            db_path,
            webhook_addr,
            webhook_secret: get("TASKBOT_WEBHOOK_SECRET"),
            upload_dir: get("TASKBOT_UPLOAD_DIR").map(PathBuf::from),
            wizard_idle: positive(&get, "TASKBOT_WIZARD_IDLE_SECS", DEFAULT_WIZARD_IDLE_SECS)?,
            actor_idle: positive(&get, "TASKBOT_ACTOR_IDLE_SECS", DEFAULT_ACTOR_IDLE_SECS)?,
            notify_interval: (notify_secs > 0).then(|| Duration::from_secs(notify_secs)),
        })
    }
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        }),
    }
}

fn positive(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match seconds(get, var, default)? {
        0 => Err(ConfigError::Invalid {
            var,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
