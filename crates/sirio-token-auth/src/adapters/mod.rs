//! Adapters: key storage, an in-memory directory, and the bus listener.

pub mod bus;
pub mod keystore;
pub mod memory_directory;
