//! Layered service configuration
//!
//! Built-in defaults, then an optional `config/swap.toml`, then `SWAP_*`
//! environment variables with `__` between nested keys
//! (e.g. `SWAP_SERVER__PORT=8080`, `SWAP_AUTH__JWT_SECRET=...`).

use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use exchange::ExchangePolicy;
use serde::Deserialize;

/// Optional settings file, relative to the working directory
const CONFIG_FILE: &str = "config/swap";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Economic policy and the expiry job
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSettings {
    pub minutes_granularity: i32,
    pub default_minutes: i32,
    pub minutes_per_token: i32,
    pub request_expiry_hours: i64,
    /// Six-field cron expression (with seconds) for the expiry sweep
    pub expiry_schedule: String,
    pub signup_grant_tokens: i64,
    pub upcoming_window_hours: i64,
}

impl ExchangeSettings {
    /// Build and validate the exchange policy
    pub fn policy(&self) -> Result<ExchangePolicy, ConfigError> {
        let policy = ExchangePolicy {
            minutes_granularity: self.minutes_granularity,
            default_minutes: self.default_minutes,
            minutes_per_token: self.minutes_per_token,
            request_expiry: hours("request_expiry_hours", self.request_expiry_hours)?,
            signup_grant_tokens: self.signup_grant_tokens,
            upcoming_window: hours("upcoming_window_hours", self.upcoming_window_hours)?,
        };
        policy
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid exchange policy: {e}")))?;
        Ok(policy)
    }
}

fn hours(key: &str, value: i64) -> Result<Duration, ConfigError> {
    Duration::try_hours(value)
        .ok_or_else(|| ConfigError::Message(format!("exchange.{key} is out of range: {value}")))
}

/// Principal authentication.
///
/// With neither key set the service trusts the acting email supplied in
/// each call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSettings {
    /// RS256 public key, inline PEM or a path to a PEM file
    pub jwt_public_key: Option<String>,
    /// HS256 shared secret
    pub jwt_secret: Option<String>,
}

impl AuthSettings {
    pub fn is_enabled(&self) -> bool {
        non_empty(&self.jwt_public_key).is_some() || non_empty(&self.jwt_secret).is_some()
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Settings {
    /// Load settings from defaults, the optional file and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let defaults = ExchangePolicy::default();

        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001_i64)?
            .set_default(
                "exchange.minutes_granularity",
                i64::from(defaults.minutes_granularity),
            )?
            .set_default(
                "exchange.default_minutes",
                i64::from(defaults.default_minutes),
            )?
            .set_default(
                "exchange.minutes_per_token",
                i64::from(defaults.minutes_per_token),
            )?
            .set_default(
                "exchange.request_expiry_hours",
                defaults.request_expiry.num_hours(),
            )?
            .set_default("exchange.expiry_schedule", "0 */5 * * * *")?
            .set_default("exchange.signup_grant_tokens", defaults.signup_grant_tokens)?
            .set_default(
                "exchange.upcoming_window_hours",
                defaults.upcoming_window.num_hours(),
            )?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("SWAP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.exchange.policy()?;
        Ok(settings)
    }
}
