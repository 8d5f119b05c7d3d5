//! # Message Context
//!
//! Payload carried alongside a message id: a key/value bag plus optional
//! post-delivery callbacks, and the opaque originator reference.

use crate::listener::BusListener;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opaque reference to whoever published a message.
///
/// Listeners may downcast it to a concrete type they know about.
#[derive(Clone, Default)]
pub struct Originator(Option<Arc<dyn Any + Send + Sync>>);

impl Originator {
    /// A message without an originator.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Wrap any shareable value as originator.
    pub fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// Downcast the originator to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns `true` when no originator was given.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for Originator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => write!(f, "Originator(..)"),
            None => write!(f, "Originator(none)"),
        }
    }
}

/// Key/value payload of a message.
///
/// Built by the publisher, read by every listener of one dispatch, then
/// dropped. Builders chain:
///
/// ```
/// use sirio_bus::BusContext;
///
/// let ctx = BusContext::new().with("sessionID", "abc").with("userID", 7);
/// assert_eq!(ctx.get_i64("userID"), Some(7));
/// ```
#[derive(Clone, Default)]
pub struct BusContext {
    values: HashMap<String, Value>,
    post_actions: Vec<Arc<dyn BusListener>>,
}

impl BusContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return the context (chaining builder).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Register a listener invoked after the synchronous dispatch completes.
    #[must_use]
    pub fn with_post_action(mut self, listener: Arc<dyn BusListener>) -> Self {
        self.post_actions.push(listener);
        self
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value lookup.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Integer value lookup. Numeric strings are accepted too.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns `true` if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Post-delivery listeners.
    pub fn post_actions(&self) -> &[Arc<dyn BusListener>] {
        &self.post_actions
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the context carries no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for BusContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusContext")
            .field("values", &self.values)
            .field("post_actions", &self.post_actions.len())
            .finish()
    }
}

/// One message of a [`MessagePack`].
#[derive(Debug, Clone)]
pub struct PackedMessage {
    pub msg_id: i32,
    pub originator: Originator,
    pub context: BusContext,
    pub delay: Duration,
}

/// Messages enqueued back to back by `send_message_pack_async`.
///
/// No message from another publisher can be interleaved inside a pack.
#[derive(Debug, Clone, Default)]
pub struct MessagePack {
    messages: Vec<PackedMessage>,
}

impl MessagePack {
    /// Create an empty pack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message with an explicit delay.
    #[must_use]
    pub fn add(
        mut self,
        msg_id: i32,
        originator: Originator,
        context: BusContext,
        delay: Duration,
    ) -> Self {
        self.messages.push(PackedMessage {
            msg_id,
            originator,
            context,
            delay,
        });
        self
    }

    /// Number of messages in the pack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the pack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn into_messages(self) -> Vec<PackedMessage> {
        self.messages
    }
}
