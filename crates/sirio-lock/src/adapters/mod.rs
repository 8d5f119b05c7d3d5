//! Adapters connecting the lock service to the rest of the system.

pub mod bus;
