//! Service configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall
//! back to defaults, except for the few settings that are interpolated
//! into SQL or bound to a socket, which must be valid.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};

use crate::error::SyncError;

/// Top-level service configuration.
///
/// Loaded once at startup via [`SyncConfig::from_env`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Socket address for the HTTP ingress (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Master switch for MySQL persistence. When off, balances are kept
    /// in an in-memory store.
    pub persistence_enabled: bool,

    /// Scheduling policy.
    pub sync: SyncSettings,

    /// Capacity of the participant EventBus broadcast channel.
    pub event_bus_capacity: usize,
}

/// Connection settings for the balance table.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Database server host name.
    pub host: String,
    /// Database server port.
    pub port: u16,
    /// Schema (database) name.
    pub name: String,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Balance table name. Always a plain SQL identifier.
    pub table: String,
    /// Transport security mode, as accepted by the `ssl-mode` URL parameter.
    pub ssl_mode: String,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
}

/// Which strategy drives routine writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMethod {
    /// Full scan of active participants on a fixed interval.
    Periodic,
    /// Write on every join and leave.
    Events,
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Strategy for routine writes.
    pub method: SyncMethod,
    /// Period between full scans of active participants.
    pub interval: Duration,
    /// Delay before the first periodic cycle.
    pub initial_delay: Duration,
    /// Write first-seen participants as soon as they join.
    pub sync_new_immediately: bool,
    /// Run the one-shot bulk reconciliation at startup.
    pub full_sync_on_startup: bool,
    /// Log every individual write at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            method: SyncMethod::Periodic,
            interval: Duration::from_secs(10 * 60),
            initial_delay: Duration::from_secs(5),
            sync_new_immediately: true,
            full_sync_on_startup: false,
            verbose: false,
        }
    }
}

impl SyncConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if `LISTEN_ADDR` cannot be parsed as
    /// a [`SocketAddr`], if `DATABASE_TABLE` is not a plain identifier, or
    /// if `DATABASE_SSL_MODE` is not a known mode.
    pub fn from_env() -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| SyncError::Config(format!("LISTEN_ADDR: {e}")))?;

        let database = DatabaseConfig::from_env()?;
        let persistence_enabled = parse_env_bool("PERSISTENCE_ENABLED", true);

        let method = match std::env::var("SYNC_METHOD") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(sync_method = %raw, "unknown sync method, defaulting to timed synchronization");
                SyncMethod::Periodic
            }),
            Err(_) => SyncMethod::Periodic,
        };
        let interval_minutes: u64 = parse_env("SYNC_INTERVAL_MINUTES", 10);

        let sync = SyncSettings {
            method,
            interval: sync_interval(interval_minutes),
            sync_new_immediately: parse_env_bool("SYNC_NEW_PARTICIPANTS_IMMEDIATELY", true),
            full_sync_on_startup: parse_env_bool("SYNC_FULL_ON_STARTUP", false),
            verbose: parse_env_bool("SYNC_VERBOSE", false),
            ..SyncSettings::default()
        };

        let event_bus_capacity = parse_env("EVENT_BUS_CAPACITY", 10_000);

        Ok(Self {
            listen_addr,
            database,
            persistence_enabled,
            sync,
            event_bus_capacity,
        })
    }
}

impl DatabaseConfig {
    /// Loads the `DATABASE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the table name or TLS mode is
    /// invalid.
    pub fn from_env() -> Result<Self, SyncError> {
        let config = Self {
            host: env_or("DATABASE_HOST", "localhost"),
            port: parse_env("DATABASE_PORT", 3306),
            name: env_or("DATABASE_NAME", "minecraft"),
            username: env_or("DATABASE_USERNAME", "root"),
            password: env_or("DATABASE_PASSWORD", ""),
            table: env_or("DATABASE_TABLE", "player_money"),
            ssl_mode: env_or("DATABASE_SSL_MODE", "verify_identity"),
            connect_timeout: Duration::from_secs(parse_env("DATABASE_CONNECT_TIMEOUT_SECS", 5)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that end up inside SQL text or the URL.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), SyncError> {
        validate_table_name(&self.table)?;
        MySqlSslMode::from_str(&self.ssl_mode)
            .map_err(|e| SyncError::Config(format!("DATABASE_SSL_MODE: {e}")))?;
        Ok(())
    }

    /// Connection URL without credentials, suitable for logs.
    #[must_use]
    pub fn connection_url(&self) -> String {
        format!(
            "mysql://{}:{}/{}?ssl-mode={}&charset=utf8mb4",
            self.host, self.port, self.name, self.ssl_mode
        )
    }

    /// Builds driver options from the URL plus credentials.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the driver rejects the URL.
    pub fn connect_options(&self) -> Result<MySqlConnectOptions, SyncError> {
        let options = MySqlConnectOptions::from_str(&self.connection_url())
            .map_err(|e| SyncError::Config(format!("database url: {e}")))?;
        Ok(options.username(&self.username).password(&self.password))
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("table", &self.table)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl FromStr for SyncMethod {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" | "timed" | "periodic" => Ok(Self::Periodic),
            "events" | "event" => Ok(Self::Events),
            other => Err(SyncError::Config(format!("unknown sync method: {other}"))),
        }
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Periodic => f.write_str("time"),
            Self::Events => f.write_str("events"),
        }
    }
}

/// Accepts 1–64 ASCII letters, digits or underscores.
///
/// # Errors
///
/// Returns [`SyncError::Config`] for anything else.
pub fn validate_table_name(table: &str) -> Result<(), SyncError> {
    let valid = !table.is_empty()
        && table.len() <= 64
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SyncError::Config(format!(
            "DATABASE_TABLE must be a plain identifier, got {table:?}"
        )))
    }
}

/// Longest accepted periodic interval, one year in minutes.
const MAX_SYNC_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

/// Converts `SYNC_INTERVAL_MINUTES` to a period in `1..=one year` minutes.
fn sync_interval(minutes: u64) -> Duration {
    let clamped = minutes.clamp(1, MAX_SYNC_INTERVAL_MINUTES);
    if clamped != minutes {
        tracing::warn!(minutes, clamped, "SYNC_INTERVAL_MINUTES out of range");
    }
    Duration::from_secs(clamped * 60)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}
