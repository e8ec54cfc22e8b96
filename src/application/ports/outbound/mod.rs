//! Outbound ports - Interfaces that the application requires from external systems

mod artifact_port;
mod generation_port;
mod profile_port;
mod session_port;

pub use artifact_port::{ArtifactStoreError, ArtifactStorePort};
pub use generation_port::{EndpointError, EndpointReply, GenerationEndpointPort};
pub use profile_port::{ProfileStoreError, ProfileStorePort, SpendOutcome};
pub use session_port::{AuthenticatedUser, SessionError, SessionPort};
