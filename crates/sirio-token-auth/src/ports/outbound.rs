//! # Outbound Ports
//!
//! Collaborators the token service depends on.

use crate::domain::entities::{AccessControlList, User};
use crate::domain::errors::AuthError;

/// User directory and credential check.
pub trait SecurityDirectory: Send + Sync {
    /// Check credentials. `Ok(None)` means rejected.
    fn login_user(&self, name: &str, password: &str) -> Result<Option<User>, AuthError>;

    /// Look a user up by name.
    fn user_by_name(&self, name: &str) -> Result<Option<User>, AuthError>;

    /// Look a user up by id.
    fn user_by_id(&self, id: i64) -> Result<Option<User>, AuthError>;

    /// Roles and permissions of `user`.
    fn acl(&self, user: &User) -> Result<AccessControlList, AuthError>;
}

impl<S: SecurityDirectory + ?Sized> SecurityDirectory for std::sync::Arc<S> {
    fn login_user(&self, name: &str, password: &str) -> Result<Option<User>, AuthError> {
        (**self).login_user(name, password)
    }

    fn user_by_name(&self, name: &str) -> Result<Option<User>, AuthError> {
        (**self).user_by_name(name)
    }

    fn user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        (**self).user_by_id(id)
    }

    fn acl(&self, user: &User) -> Result<AccessControlList, AuthError> {
        (**self).acl(user)
    }
}

/// Wall clock in milliseconds since the Unix epoch (injectable for tests).
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Time source moved by hand, for expiry tests.
#[derive(Debug, Default)]
pub struct ControllableTimeSource {
    now: std::sync::atomic::AtomicU64,
}

impl ControllableTimeSource {
    pub fn new(initial_ms: u64) -> Self {
        Self {
            now: std::sync::atomic::AtomicU64::new(initial_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now_ms(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
