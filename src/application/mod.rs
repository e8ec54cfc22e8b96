//! Application layer - Use cases and boundary interfaces
//!
//! Services here hold the business rules for credit gating and generation.
//! They depend only on the domain model and on outbound ports; everything
//! that talks to the network lives behind those ports in infrastructure.

pub mod dto;
pub mod ports;
pub mod services;
