use async_trait::async_trait;

use crate::domain::entities::{ArtifactRecord, GeneratedArtifact};
use crate::domain::value_objects::ProjectId;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactStoreError {
    #[error("Persistence error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Durable storage for generated artifacts
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    async fn save_artifact(
        &self,
        project_id: ProjectId,
        artifact: &GeneratedArtifact,
    ) -> Result<ArtifactRecord, ArtifactStoreError>;
}
