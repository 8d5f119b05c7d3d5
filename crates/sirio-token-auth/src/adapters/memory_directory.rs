//! # In-Memory Security Directory
//!
//! [`SecurityDirectory`] backed by a map, for tests and single-node setups.
//! Passwords are kept as SHA-256 digests and compared in constant time.

use crate::domain::entities::{AccessControlList, User};
use crate::domain::errors::AuthError;
use crate::ports::outbound::SecurityDirectory;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use subtle::ConstantTimeEq;

struct Account {
    user: User,
    password_hash: [u8; 32],
    acl: AccessControlList,
}

/// Directory holding users in memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub fn add_user(&self, user: User, password: &str, acl: AccessControlList) {
        let account = Account {
            password_hash: hash_password(password),
            user,
            acl,
        };
        self.accounts
            .write()
            .insert(account.user.name.clone(), account);
    }

    /// Builder form of [`add_user`](Self::add_user).
    #[must_use]
    pub fn with_user(self, user: User, password: &str, acl: AccessControlList) -> Self {
        self.add_user(user, password, acl);
        self
    }

    pub fn remove_user(&self, name: &str) -> bool {
        self.accounts.write().remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl SecurityDirectory for InMemoryDirectory {
    fn login_user(&self, name: &str, password: &str) -> Result<Option<User>, AuthError> {
        let accounts = self.accounts.read();
        let Some(account) = accounts.get(name) else {
            return Ok(None);
        };
        let matches: bool = account.password_hash[..]
            .ct_eq(&hash_password(password)[..])
            .into();
        Ok(matches.then(|| account.user.clone()))
    }

    fn user_by_name(&self, name: &str) -> Result<Option<User>, AuthError> {
        Ok(self.accounts.read().get(name).map(|a| a.user.clone()))
    }

    fn user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone()))
    }

    fn acl(&self, user: &User) -> Result<AccessControlList, AuthError> {
        Ok(self
            .accounts
            .read()
            .get(&user.name)
            .map(|a| a.acl.clone())
            .unwrap_or_default())
    }
}

fn hash_password(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::new().with_user(
            User::new(7, "mario"),
            "pizza",
            AccessControlList::new(["admin"], Vec::<String>::new()),
        )
    }

    #[test]
    fn test_login() {
        let dir = directory();
        assert_eq!(dir.login_user("mario", "pizza").unwrap().unwrap().id, 7);
        assert!(dir.login_user("mario", "pasta").unwrap().is_none());
        assert!(dir.login_user("luigi", "pizza").unwrap().is_none());
    }

    #[test]
    fn test_lookups() {
        let dir = directory();
        assert_eq!(dir.user_by_id(7).unwrap().unwrap().name, "mario");
        assert!(dir.user_by_name("luigi").unwrap().is_none());

        let user = dir.user_by_name("mario").unwrap().unwrap();
        assert!(dir.acl(&user).unwrap().has_role("admin"));
        assert!(dir.remove_user("mario"));
        assert!(dir.is_empty());
    }
}
