//! # Bus Adapter
//!
//! Keeps the session logon index in step with bus events:
//!
//! | message | context | effect |
//! |---|---|---|
//! | `USER_LOGON` | `sessionID`, `userID`, `userName` | session registered |
//! | `USER_LOGOUT` | `sessionID` | session forgotten, its clients dropped |
//! | `IDLE_10_MINUTES` | - | expired tokens purged |

use crate::domain::entities::TokenBean;
use crate::ports::inbound::TokenAuthApi;
use crate::ports::outbound::{SecurityDirectory, TimeSource};
use crate::service::TokenAuthService;
use sirio_bus::messages::{
    CTX_SESSION_ID, CTX_USER_ID, CTX_USER_NAME, IDLE_10_MINUTES, USER_LOGON, USER_LOGOUT,
};
use sirio_bus::{BusContext, BusError, BusListener, MessageBus, Originator};
use std::sync::Arc;

/// Name under which the listener registers on the bus.
pub const LISTENER_NAME: &str = "token-auth.sessions";

/// Sync listener feeding bus events into a [`TokenAuthApi`].
pub struct TokenAuthBusListener<A: TokenAuthApi> {
    auth: Arc<A>,
}

impl<A: TokenAuthApi + 'static> TokenAuthBusListener<A> {
    pub fn new(auth: Arc<A>) -> Self {
        Self { auth }
    }
}

impl<A: TokenAuthApi> BusListener for TokenAuthBusListener<A> {
    fn message_received(
        &self,
        msg_id: i32,
        _originator: &Originator,
        context: &BusContext,
    ) -> Result<i32, BusError> {
        match msg_id {
            USER_LOGON => {
                let session = session_id(msg_id, context)?;
                let user_id = context
                    .get_i64(CTX_USER_ID)
                    .ok_or_else(|| BusError::listener(msg_id, "missing userID"))?;
                let user_name = context.get_str(CTX_USER_NAME).unwrap_or_default();
                self.auth.register_session_logon(
                    session,
                    TokenBean {
                        user_id,
                        user_name: user_name.to_string(),
                    },
                );
            }
            USER_LOGOUT => {
                let session = session_id(msg_id, context)?;
                self.auth.register_session_logout(session);
            }
            IDLE_10_MINUTES => {
                self.auth.purge_expired();
            }
            _ => {}
        }
        Ok(0)
    }
}

fn session_id(msg_id: i32, context: &BusContext) -> Result<&str, BusError> {
    context
        .get_str(CTX_SESSION_ID)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BusError::listener(msg_id, "missing sessionID"))
}

/// Register the session listener on `bus` and let `service` publish its
/// token events there.
pub fn attach<D, T>(bus: &Arc<MessageBus>, service: &Arc<TokenAuthService<D, T>>)
where
    D: SecurityDirectory + 'static,
    T: TimeSource + 'static,
{
    service.set_bus(bus);
    bus.register_sync_listener(
        LISTENER_NAME,
        Arc::new(TokenAuthBusListener::new(Arc::clone(service))),
    );
}
