//! Domain layer: token items, TTL cache, credentials and errors.

pub mod bearer;
pub mod cache;
pub mod csrf;
pub mod entities;
pub mod errors;
pub mod magic;
