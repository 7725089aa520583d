//! # Server Configuration
//!
//! Settings for the library server, loaded from TOML with environment
//! overrides.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. Defaults          LibraryConfig::default()                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  2. Config file       --config <path>, or the platform config dir:     │
//! │                       ~/.config/library/library.toml (Linux)           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  3. Environment       LIBRARY_PORT=9000, LIBRARY_REQUIRE_LOGIN=true ...│
//! │         │                                                               │
//! │         ▼                                                               │
//! │  4. validate()        rejects zero limits, short secrets, ...          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Config File
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/library/library.db"
//! max_connections = 5
//!
//! [lending]
//! loan_period_days = 14
//! fine_per_day_cents = 10
//! student_limit = 5
//! class_monitor_limit = 10
//!
//! [auth]
//! session_secret = "a long random string"
//! session_lifetime_secs = 28800
//! require_login = true
//! ```

use std::path::{Path, PathBuf};

use library_core::{
    LendingPolicy, Money, CLASS_MONITOR_BORROW_LIMIT, DEFAULT_FINE_PER_DAY_CENTS,
    DEFAULT_LOAN_PERIOD_DAYS, STUDENT_BORROW_LIMIT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Secrets shorter than this are refused when login is required.
pub const MIN_SECRET_LEN: usize = 16;

const DEV_SESSION_SECRET: &str = "library-dev-secret-change-in-production";

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

/// Where the HTTP server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// SQLite file and pool size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// `library.db` in the platform data directory, or the working directory
/// when there is no home.
fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "school", "library")
        .map(|dirs| dirs.data_dir().join("library.db"))
        .unwrap_or_else(|| PathBuf::from("library.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Loan period, fine rate and borrowing limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingSettings {
    #[serde(default = "default_loan_period")]
    pub loan_period_days: u32,

    #[serde(default = "default_fine_per_day")]
    pub fine_per_day_cents: i64,

    #[serde(default = "default_student_limit")]
    pub student_limit: u32,

    #[serde(default = "default_class_monitor_limit")]
    pub class_monitor_limit: u32,
}

fn default_loan_period() -> u32 {
    DEFAULT_LOAN_PERIOD_DAYS
}

fn default_fine_per_day() -> i64 {
    DEFAULT_FINE_PER_DAY_CENTS
}

fn default_student_limit() -> u32 {
    STUDENT_BORROW_LIMIT
}

fn default_class_monitor_limit() -> u32 {
    CLASS_MONITOR_BORROW_LIMIT
}

impl Default for LendingSettings {
    fn default() -> Self {
        LendingSettings {
            loan_period_days: default_loan_period(),
            fine_per_day_cents: default_fine_per_day(),
            student_limit: default_student_limit(),
            class_monitor_limit: default_class_monitor_limit(),
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC key for session tokens.
    #[serde(default = "default_session_secret")]
    pub session_secret: String,

    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: i64,

    /// When false the API is open; signup and login still work.
    #[serde(default)]
    pub require_login: bool,
}

fn default_session_secret() -> String {
    DEV_SESSION_SECRET.to_string()
}

fn default_session_lifetime() -> i64 {
    8 * 60 * 60 // One school day
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            session_secret: default_session_secret(),
            session_lifetime_secs: default_session_lifetime(),
            require_login: false,
        }
    }
}

// =============================================================================
// Library Configuration
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub lending: LendingSettings,

    #[serde(default)]
    pub auth: AuthSettings,
}

impl LibraryConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// An explicitly given file must exist; the default location is
    /// optional.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        if config.auth.session_secret == DEV_SESSION_SECRET {
            warn!("Using the built-in development session secret; set LIBRARY_SESSION_SECRET");
        }

        Ok(config)
    }

    /// Parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(?path, "Loading library config from file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.lending.loan_period_days == 0 {
            return Err(ConfigError::Invalid(
                "lending.loan_period_days must be greater than 0".into(),
            ));
        }

        if self.lending.fine_per_day_cents < 0 {
            return Err(ConfigError::Invalid(
                "lending.fine_per_day_cents cannot be negative".into(),
            ));
        }

        if self.lending.student_limit == 0 || self.lending.class_monitor_limit == 0 {
            return Err(ConfigError::Invalid(
                "borrowing limits must be greater than 0".into(),
            ));
        }

        if self.auth.session_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid(
                "auth.session_lifetime_secs must be greater than 0".into(),
            ));
        }

        if self.auth.require_login && self.auth.session_secret == DEV_SESSION_SECRET {
            return Err(ConfigError::Invalid(
                "auth.session_secret must be set when login is required".into(),
            ));
        }

        if self.auth.require_login && self.auth.session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.session_secret must be at least {} characters when login is required",
                MIN_SECRET_LEN
            )));
        }

        Ok(())
    }

    /// The lending rules handed to the database layer.
    pub fn to_policy(&self) -> LendingPolicy {
        LendingPolicy {
            loan_period_days: self.lending.loan_period_days,
            fine_per_day: Money::from_cents(self.lending.fine_per_day_cents),
            student_limit: self.lending.student_limit,
            class_monitor_limit: self.lending.class_monitor_limit,
        }
    }

    /// Applies `LIBRARY_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("LIBRARY_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = lookup("LIBRARY_PORT") {
            self.server.port = parse_value("LIBRARY_PORT", &port)?;
            debug!(port = self.server.port, "Overriding port from environment");
        }

        if let Some(path) = lookup("LIBRARY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = lookup("LIBRARY_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("LIBRARY_DB_MAX_CONNECTIONS", &max)?;
        }

        if let Some(days) = lookup("LIBRARY_LOAN_PERIOD_DAYS") {
            self.lending.loan_period_days = parse_value("LIBRARY_LOAN_PERIOD_DAYS", &days)?;
        }
        if let Some(cents) = lookup("LIBRARY_FINE_PER_DAY_CENTS") {
            self.lending.fine_per_day_cents = parse_value("LIBRARY_FINE_PER_DAY_CENTS", &cents)?;
        }
        if let Some(limit) = lookup("LIBRARY_STUDENT_LIMIT") {
            self.lending.student_limit = parse_value("LIBRARY_STUDENT_LIMIT", &limit)?;
        }
        if let Some(limit) = lookup("LIBRARY_CLASS_MONITOR_LIMIT") {
            self.lending.class_monitor_limit = parse_value("LIBRARY_CLASS_MONITOR_LIMIT", &limit)?;
        }

        if let Some(secret) = lookup("LIBRARY_SESSION_SECRET") {
            self.auth.session_secret = secret;
        }
        if let Some(secs) = lookup("LIBRARY_SESSION_LIFETIME_SECS") {
            self.auth.session_lifetime_secs = parse_value("LIBRARY_SESSION_LIFETIME_SECS", &secs)?;
        }
        if let Some(flag) = lookup("LIBRARY_REQUIRE_LOGIN") {
            self.auth.require_login = parse_value("LIBRARY_REQUIRE_LOGIN", &flag)?;
        }

        Ok(())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "school", "library")
            .map(|dirs| dirs.config_dir().join("library.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
