//! # Node Configuration
//!
//! Aggregates the per-service configs and the runtime's own settings.
//!
//! ## Security Requirements
//!
//! - Magic logon users need a non-empty shared secret and app uuid
//! - The bearer token keypair should be persisted (`SIRIO_AUTH_KEYSTORE_DIR`)
//!   so tokens survive a restart

use sirio_bus::BusConfig;
use sirio_lock::LockConfig;
use sirio_token_auth::AuthConfig;
use std::env;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct SirioConfig {
    /// Log output.
    pub logging: LoggingConfig,
    /// Message bus.
    pub bus: BusConfig,
    /// Resource lock service.
    pub lock: LockConfig,
    /// Token auth service.
    pub auth: AuthConfig,
    /// Users loaded into the in-memory directory at startup.
    pub users: Vec<UserSeed>,
}

impl SirioConfig {
    /// Load every section from the environment.
    pub fn from_env() -> Self {
        Self {
            logging: LoggingConfig::from_env(),
            bus: BusConfig::from_env(),
            lock: LockConfig::from_env(),
            auth: AuthConfig::from_env(),
            users: env::var("SIRIO_USERS")
                .map(|raw| parse_users(&raw))
                .unwrap_or_default(),
        }
    }

    /// Validate configuration for production readiness.
    ///
    /// # Errors
    ///
    /// - magic users configured without a secret or without an app uuid
    /// - bearer keypair not persisted
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if !self.auth.magic_users.is_empty() {
            if self.auth.magic_secret.is_empty() {
                return Err(ConfigError::MissingMagicSecret);
            }
            if self.auth.app_uuid.is_empty() {
                return Err(ConfigError::MissingAppUuid);
            }
        }
        if self.auth.keystore_dir.is_none() {
            return Err(ConfigError::EphemeralKeystore);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "SECURITY VIOLATION: magic logon users configured without a secret. \
         Set SIRIO_AUTH_MAGIC_SECRET or clear SIRIO_AUTH_MAGIC_USERS."
    )]
    MissingMagicSecret,

    #[error("Magic logon users configured without SIRIO_AUTH_APP_UUID")]
    MissingAppUuid,

    #[error("Bearer token keypair is not persisted. Set SIRIO_AUTH_KEYSTORE_DIR.")]
    EphemeralKeystore,
}

/// Log output configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive (e.g. `info`, `sirio_lock=debug`).
    pub log_level: String,
    /// JSON lines instead of human-readable output.
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl LoggingConfig {
    /// # Environment Variables
    ///
    /// - `SIRIO_LOG_LEVEL` or `RUST_LOG`: filter (default: info)
    /// - `SIRIO_JSON_LOGS`: JSON output (default: false)
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("SIRIO_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("SIRIO_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        }
    }
}

/// A directory user declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSeed {
    pub id: i64,
    pub name: String,
    pub password: String,
    pub roles: Vec<String>,
}

/// Parse `SIRIO_USERS`: `;`-separated `id:name:password[:role|role]`.
fn parse_users(raw: &str) -> Vec<UserSeed> {
    raw.split(';')
        .filter_map(|entry| {
            let mut parts = entry.trim().splitn(4, ':');
            let id = parts.next()?.parse().ok()?;
            let name = parts.next().filter(|n| !n.is_empty())?.to_string();
            let password = parts.next()?.to_string();
            let roles = parts
                .next()
                .map(|r| {
                    r.split('|')
                        .filter(|r| !r.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            Some(UserSeed {
                id,
                name,
                password,
                roles,
            })
        })
        .collect()
}
