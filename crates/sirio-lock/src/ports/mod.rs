//! # Ports Layer
//!
//! - **Inbound (Driving)**: `ResourceLockApi`, used by application code

pub mod inbound;
