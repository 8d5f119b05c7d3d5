//! # Listeners
//!
//! Handlers registered on the bus under a caller-chosen name. The name
//! decides the dispatch order: listeners run in ascending lexicographic
//! order of their names, whatever the registration order was.

use crate::context::{BusContext, Originator};
use crate::error::BusError;
use std::any::Any;
use std::sync::Arc;

/// Handler for synchronous and asynchronous messages.
///
/// Return `Ok(0)` to let the dispatch continue. Any other value stops the
/// dispatch and becomes the result of `send_message_sync`. An `Err` is
/// logged and treated as `Ok(0)`.
pub trait BusListener: Send + Sync {
    /// Handle one message.
    fn message_received(
        &self,
        msg_id: i32,
        originator: &Originator,
        context: &BusContext,
    ) -> Result<i32, BusError>;
}

impl<F> BusListener for F
where
    F: Fn(i32, &Originator, &BusContext) -> Result<i32, BusError> + Send + Sync,
{
    fn message_received(
        &self,
        msg_id: i32,
        originator: &Originator,
        context: &BusContext,
    ) -> Result<i32, BusError> {
        self(msg_id, originator, context)
    }
}

/// Handler for messages published inside an external transaction.
///
/// `connection` is the caller's open transaction handle; listeners downcast
/// it to the concrete connection type they work with. Errors propagate to
/// the publisher so that it can roll the transaction back.
pub trait TransactionListener: Send + Sync {
    /// Handle one message inside the caller's transaction.
    fn message_received(
        &self,
        msg_id: i32,
        originator: &Originator,
        connection: &mut dyn Any,
        context: &BusContext,
    ) -> Result<i32, BusError>;
}

impl<F> TransactionListener for F
where
    F: Fn(i32, &Originator, &mut dyn Any, &BusContext) -> Result<i32, BusError> + Send + Sync,
{
    fn message_received(
        &self,
        msg_id: i32,
        originator: &Originator,
        connection: &mut dyn Any,
        context: &BusContext,
    ) -> Result<i32, BusError> {
        self(msg_id, originator, connection, context)
    }
}

/// Box a closure as a shareable [`BusListener`].
///
/// Pins the closure signature so argument and error types need no
/// annotations at the call site.
pub fn listener_fn<F>(f: F) -> Arc<dyn BusListener>
where
    F: Fn(i32, &Originator, &BusContext) -> Result<i32, BusError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Box a closure as a shareable [`TransactionListener`].
pub fn transaction_listener_fn<F>(f: F) -> Arc<dyn TransactionListener>
where
    F: Fn(i32, &Originator, &mut dyn Any, &BusContext) -> Result<i32, BusError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}
