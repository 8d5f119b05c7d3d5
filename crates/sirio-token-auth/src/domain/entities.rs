//! # Token Auth Entities
//!
//! - [`User`] and [`AccessControlList`]: what the security directory knows
//! - [`TokenBean`]: a pending logon announced on the bus for a session
//! - [`TokenAuthItem`]: one authenticated client, cached under its client id

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A directory user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        }
    }
}

/// Roles and permissions granted to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    roles: BTreeSet<String>,
    permissions: BTreeSet<String>,
}

impl AccessControlList {
    pub fn new<R, P>(roles: R, permissions: P) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn permissions(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }
}

/// Pending logon: the user a session authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBean {
    pub user_id: i64,
    pub user_name: String,
}

/// Notified when an attribute enters or leaves a [`TokenAuthItem`].
pub trait BindingListener: Send + Sync {
    /// The attribute was stored under `name`.
    fn value_bound(&self, _name: &str) {}

    /// The attribute was replaced, removed, or its item was cleared.
    fn value_unbound(&self, _name: &str) {}
}

/// An attribute stored on a token item.
#[derive(Clone)]
pub enum AttributeValue {
    /// Plain data.
    Json(Value),
    /// An object that wants bind/unbind notifications.
    Bound(Arc<dyn BindingListener>),
}

impl AttributeValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Bound(_) => None,
        }
    }

    fn bound(&self, name: &str) {
        if let Self::Bound(listener) = self {
            listener.value_bound(name);
        }
    }

    fn unbound(&self, name: &str) {
        if let Self::Bound(listener) = self {
            listener.value_unbound(name);
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(v) => write!(f, "Json({v})"),
            Self::Bound(_) => write!(f, "Bound(..)"),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// One authenticated client.
///
/// Shared as `Arc<TokenAuthItem>` between the cache and request handlers.
/// When the cache evicts or removes it, [`clear`](Self::clear) unbinds every
/// attribute; after that the item accepts no new attributes.
pub struct TokenAuthItem {
    id_client: String,
    session: Option<String>,
    user: User,
    acl: AccessControlList,
    logon_time: DateTime<Utc>,
    last_access: Mutex<DateTime<Utc>>,
    attributes: Mutex<HashMap<String, AttributeValue>>,
    cleared: AtomicBool,
}

impl TokenAuthItem {
    pub fn new(
        id_client: impl Into<String>,
        session: Option<String>,
        user: User,
        acl: AccessControlList,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id_client: id_client.into(),
            session,
            user,
            acl,
            logon_time: now,
            last_access: Mutex::new(now),
            attributes: Mutex::new(HashMap::new()),
            cleared: AtomicBool::new(false),
        }
    }

    pub fn id_client(&self) -> &str {
        &self.id_client
    }

    /// HTTP session the client logged on from, if any.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.acl.has_role(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.acl.has_permission(permission)
    }

    pub fn logon_time(&self) -> DateTime<Utc> {
        self.logon_time
    }

    pub fn last_access_time(&self) -> DateTime<Utc> {
        *self.last_access.lock()
    }

    pub(crate) fn touch(&self, now: DateTime<Utc>) {
        *self.last_access.lock() = now;
    }

    /// Store an attribute, unbinding any value it replaces.
    ///
    /// Returns `false` (and binds nothing) once the item is cleared.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<AttributeValue>) -> bool {
        let name = name.into();
        let value = value.into();
        let previous = {
            let mut attributes = self.attributes.lock();
            // Checked under the map lock so a concurrent `clear` drains this value.
            if self.is_cleared() {
                return false;
            }
            attributes.insert(name.clone(), value.clone())
        };
        if let Some(previous) = previous {
            previous.unbound(&name);
        }
        value.bound(&name);
        true
    }

    pub fn get_attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.lock().get(name).cloned()
    }

    /// Remove an attribute, unbinding it.
    pub fn remove_attribute(&self, name: &str) -> Option<AttributeValue> {
        let removed = self.attributes.lock().remove(name);
        if let Some(value) = &removed {
            value.unbound(name);
        }
        removed
    }

    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Unbind and drop every attribute. Only the first call does anything.
    pub fn clear(&self) {
        let drained: Vec<(String, AttributeValue)> = {
            let mut attributes = self.attributes.lock();
            if self.cleared.swap(true, Ordering::SeqCst) {
                return;
            }
            attributes.drain().collect()
        };
        for (name, value) in &drained {
            value.unbound(name);
        }
        debug!(id_client = %self.id_client, attributes = drained.len(), "Token item cleared");
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TokenAuthItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthItem")
            .field("id_client", &self.id_client)
            .field("session", &self.session)
            .field("user", &self.user.name)
            .field("logon_time", &self.logon_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct BindCounter {
        bound: AtomicUsize,
        unbound: AtomicUsize,
    }

    impl BindingListener for BindCounter {
        fn value_bound(&self, _name: &str) {
            self.bound.fetch_add(1, Ordering::SeqCst);
        }

        fn value_unbound(&self, _name: &str) {
            self.unbound.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn item() -> TokenAuthItem {
        let acl = AccessControlList::new(["admin"], ["invoice.edit"]);
        TokenAuthItem::new("c1", None, User::new(7, "mario"), acl, Utc::now())
    }

    #[test]
    fn test_acl_checks() {
        let item = item();
        assert!(item.has_role("admin"));
        assert!(!item.has_role("guest"));
        assert!(item.has_permission("invoice.edit"));
        assert!(!item.has_permission("invoice.delete"));
    }

    #[test]
    fn test_replace_unbinds_previous() {
        let item = item();
        let first = Arc::new(BindCounter::default());
        let second = Arc::new(BindCounter::default());

        item.set_attribute("cart", AttributeValue::Bound(first.clone()));
        item.set_attribute("cart", AttributeValue::Bound(second.clone()));

        assert_eq!(first.bound.load(Ordering::SeqCst), 1);
        assert_eq!(first.unbound.load(Ordering::SeqCst), 1);
        assert_eq!(second.bound.load(Ordering::SeqCst), 1);
        assert_eq!(second.unbound.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_unbinds_once() {
        let item = item();
        let counter = Arc::new(BindCounter::default());
        item.set_attribute("cart", AttributeValue::Bound(counter.clone()));
        item.set_attribute("lang", Value::from("it"));

        item.clear();
        item.clear();

        assert_eq!(counter.unbound.load(Ordering::SeqCst), 1);
        assert!(item.attribute_names().is_empty());
        assert!(!item.set_attribute("late", Value::from(1)));
    }

    #[test]
    fn test_concurrent_set_and_clear_leave_nothing_bound() {
        for _ in 0..200 {
            let item = Arc::new(item());
            let counter = Arc::new(BindCounter::default());

            let setter = {
                let item = Arc::clone(&item);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let bound = AttributeValue::Bound(counter.clone());
                        if !item.set_attribute(format!("attr-{i}"), bound) {
                            break;
                        }
                    }
                })
            };
            item.clear();
            setter.join().unwrap();

            assert!(item.attribute_names().is_empty());
            assert_eq!(
                counter.bound.load(Ordering::SeqCst),
                counter.unbound.load(Ordering::SeqCst)
            );
        }
    }

    #[test]
    fn test_json_attribute() {
        let item = item();
        item.set_attribute("lang", Value::from("it"));
        let value = item.get_attribute("lang").unwrap();
        assert_eq!(value.as_json(), Some(&Value::from("it")));
        assert!(item.remove_attribute("lang").is_some());
        assert!(item.get_attribute("lang").is_none());
    }
}
