//! Application services - Use case implementations
//!
//! This module contains the application services that implement the use cases
//! for the Previz Engine. Each service follows hexagonal architecture
//! principles, accepting port dependencies and returning domain entities or
//! DTOs.

pub mod credit_gate;
pub mod generation_client;
pub mod generation_workflow;
pub mod profile_service;

// Re-export profile service types
#[allow(unused_imports)]
pub use profile_service::{BalancePhase, BalanceSnapshot, ProfileService};

// Re-export credit gate types
#[allow(unused_imports)]
pub use credit_gate::{CreditGate, CreditGateError, DeductReceipt, GateState, ValidationResult};

// Re-export generation client types
#[allow(unused_imports)]
pub use generation_client::{GenerationClient, GenerationError, GenerationReply};

// Re-export generation workflow types
pub use generation_workflow::{GenerationWorkflow, PersistOutcome, WorkflowError, WorkflowOutcome};
