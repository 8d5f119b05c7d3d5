//! # Token Auth Configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default lifetime of an idle client token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Default lifetime of an anti-CSRF token.
pub const DEFAULT_CSRF_TTL: Duration = Duration::from_secs(60 * 60);

/// Token auth service configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Idle lifetime of a cached client token. Each hit restarts it.
    pub token_ttl: Duration,
    /// Lifetime of an anti-CSRF token.
    pub csrf_ttl: Duration,
    /// Directory user used by `add_client_anonymous`. `None` disables it.
    pub anonymous_user: Option<String>,
    /// Users allowed to log on with the magic password.
    pub magic_users: Vec<String>,
    /// Shared secret mixed into the magic password.
    pub magic_secret: String,
    /// Application identifier mixed into the magic password.
    pub app_uuid: String,
    /// Where the bearer token keypair lives. `None` keeps a generated
    /// keypair in memory only.
    pub keystore_dir: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl: DEFAULT_TOKEN_TTL,
            csrf_ttl: DEFAULT_CSRF_TTL,
            anonymous_user: Some("anonymous".to_string()),
            magic_users: Vec::new(),
            magic_secret: String::new(),
            app_uuid: String::new(),
            keystore_dir: None,
        }
    }
}

impl AuthConfig {
    /// Load configuration from `SIRIO_AUTH_*` environment variables.
    ///
    /// Unset or malformed variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("SIRIO_AUTH_TOKEN_TTL_SECS") {
            config.token_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SIRIO_AUTH_CSRF_TTL_SECS") {
            config.csrf_ttl = Duration::from_secs(secs);
        }
        if let Ok(user) = env::var("SIRIO_AUTH_ANONYMOUS_USER") {
            config.anonymous_user = (!user.is_empty()).then_some(user);
        }
        if let Ok(users) = env::var("SIRIO_AUTH_MAGIC_USERS") {
            config.magic_users = users
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(secret) = env::var("SIRIO_AUTH_MAGIC_SECRET") {
            config.magic_secret = secret;
        }
        if let Ok(uuid) = env::var("SIRIO_AUTH_APP_UUID") {
            config.app_uuid = uuid;
        }
        if let Ok(dir) = env::var("SIRIO_AUTH_KEYSTORE_DIR") {
            config.keystore_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }

        config
    }

    /// Create a config for tests: short TTLs, one magic user.
    pub fn for_testing() -> Self {
        Self {
            token_ttl: Duration::from_secs(60),
            csrf_ttl: Duration::from_secs(60),
            anonymous_user: Some("anonymous".to_string()),
            magic_users: vec!["support".to_string()],
            magic_secret: "s3cret".to_string(),
            app_uuid: "test-app".to_string(),
            keystore_dir: None,
        }
    }

    /// Returns `true` if `user` may use the magic password.
    pub fn is_magic_user(&self, user: &str) -> bool {
        !self.magic_secret.is_empty() && self.magic_users.iter().any(|u| u == user)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.token_ttl, DEFAULT_TOKEN_TTL);
        assert_eq!(config.anonymous_user.as_deref(), Some("anonymous"));
        assert!(config.keystore_dir.is_none());
    }

    #[test]
    fn test_magic_user_needs_secret() {
        let mut config = AuthConfig::for_testing();
        assert!(config.is_magic_user("support"));
        assert!(!config.is_magic_user("mario"));

        config.magic_secret.clear();
        assert!(!config.is_magic_user("support"));
    }
}
