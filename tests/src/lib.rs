//! # Sirio Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── bus_locks.rs     # idle heartbeat driving lock reaping
//!     ├── auth_sessions.rs # logon/logout events, token lifecycle, bearer tokens
//!     └── node.rs          # full container: config, keystore, shutdown drain
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sirio-tests
//! cargo test -p sirio-tests integration::auth_sessions
//!
//! # Benchmarks
//! cargo bench -p sirio-tests
//! ```

pub mod integration;
