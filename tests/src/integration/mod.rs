//! Cross-service flows.

pub mod auth_sessions;
pub mod bus_locks;
pub mod node;
