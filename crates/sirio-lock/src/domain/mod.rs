//! # Domain Layer
//!
//! Lock table entities and error types. No I/O.

pub mod entities;
pub mod errors;
