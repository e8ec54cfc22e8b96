//! Supabase artifact store
//!
//! Generated artifacts land in one table keyed by a client-side id, with
//! the full artifact JSON in a `content` column. Persistence failures are
//! reported to the caller, who decides whether the artifact is still
//! usable without a stored copy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ports::outbound::{ArtifactStoreError, ArtifactStorePort};
use crate::domain::entities::{ArtifactRecord, GeneratedArtifact};
use crate::domain::value_objects::{ArtifactId, ProjectId};
use crate::infrastructure::persistence::supabase::SupabaseClient;

pub const ARTIFACT_TABLE: &str = "generated_artifacts";

pub struct SupabaseArtifactRepository {
    client: SupabaseClient,
}

impl SupabaseArtifactRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactStorePort for SupabaseArtifactRepository {
    async fn save_artifact(
        &self,
        project_id: ProjectId,
        artifact: &GeneratedArtifact,
    ) -> Result<ArtifactRecord, ArtifactStoreError> {
        let content = serde_json::to_value(artifact)
            .map_err(|e| ArtifactStoreError::Serialization(e.to_string()))?;
        let row = ArtifactRow {
            id: *ArtifactId::new().as_uuid(),
            project_id: *project_id.as_uuid(),
            kind: artifact.kind().to_string(),
            content,
            created_at: Utc::now(),
        };

        let request = self.client.rest_post(ARTIFACT_TABLE).json(&row);
        let response = self
            .client
            .send_checked(request)
            .await
            .map_err(|e| ArtifactStoreError::Backend(e.to_string()))?;

        let rows: Vec<ArtifactRow> = response
            .json()
            .await
            .map_err(|e| ArtifactStoreError::Serialization(e.to_string()))?;
        let stored = rows.into_iter().next().unwrap_or(row);

        Ok(ArtifactRecord {
            id: ArtifactId::from(stored.id),
            project_id: ProjectId::from(stored.project_id),
            kind: stored.kind,
            created_at: stored.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactRow {
    id: Uuid,
    project_id: Uuid,
    kind: String,
    content: serde_json::Value,
    created_at: DateTime<Utc>,
}
