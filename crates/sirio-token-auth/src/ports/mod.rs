//! Ports layer: the service API and the collaborators it needs.

pub mod inbound;
pub mod outbound;
