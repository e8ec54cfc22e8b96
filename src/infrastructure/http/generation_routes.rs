//! Generation API routes
//!
//! One route per paid artifact. Handlers translate bodies into prompts,
//! run the workflow and answer with the artifact plus everything the
//! client needs to reconcile its local state: the stored record (or the
//! persistence failure), whether the deduction landed and the remaining
//! balance.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::dto::{
    FramePrompt, PhotoboardPrompt, ShotListPrompt, ShotSummary, StoryPrompt,
};
use crate::application::services::{GenerationError, PersistOutcome, WorkflowError, WorkflowOutcome};
use crate::domain::entities::{ArtifactRecord, GeneratedArtifact};
use crate::domain::value_objects::ProjectId;
use crate::infrastructure::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StoryRequest {
    pub premise: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShotListRequest {
    pub scene_heading: String,
    pub scene_summary: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoboardRequest {
    pub shots: Vec<ShotSummaryRequest>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShotSummaryRequest {
    pub number: u32,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub description: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub kind: String,
    pub artifact: GeneratedArtifact,
    pub record: Option<ArtifactRecordResponse>,
    /// Set when the artifact could not be persisted
    pub persist_error: Option<String>,
    pub credit_deduction_failed: bool,
    pub remaining_credits: Option<u32>,
    pub from_cache: bool,
    pub attempts: u32,
}

#[derive(Debug, Serialize)]
pub struct ArtifactRecordResponse {
    pub id: String,
    pub project_id: String,
    pub kind: String,
    pub created_at: String,
}

impl From<ArtifactRecord> for ArtifactRecordResponse {
    fn from(record: ArtifactRecord) -> Self {
        Self {
            id: record.id.to_string(),
            project_id: record.project_id.to_string(),
            kind: record.kind,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

impl From<WorkflowOutcome> for GenerationResponse {
    fn from(outcome: WorkflowOutcome) -> Self {
        let (record, persist_error) = match outcome.record {
            PersistOutcome::Stored(record) => (Some(ArtifactRecordResponse::from(record)), None),
            PersistOutcome::Failed { reason } => (None, Some(reason)),
        };
        Self {
            kind: outcome.artifact.kind().to_string(),
            artifact: outcome.artifact,
            record,
            persist_error,
            credit_deduction_failed: outcome.credit_deduction_failed,
            remaining_credits: outcome.remaining_credits,
            from_cache: outcome.from_cache,
            attempts: outcome.attempts,
        }
    }
}

fn parse_project_id(raw: &str) -> Result<ProjectId, (StatusCode, String)> {
    Uuid::parse_str(raw)
        .map(ProjectId::from)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid project ID".to_string()))
}

fn error_response(error: WorkflowError) -> (StatusCode, String) {
    match &error {
        WorkflowError::NotAuthenticated => (StatusCode::UNAUTHORIZED, error.to_string()),
        WorkflowError::Blocked(_) => (StatusCode::PAYMENT_REQUIRED, error.to_string()),
        WorkflowError::Generation(GenerationError::Rejected { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
        }
        WorkflowError::Generation(_) => (StatusCode::BAD_GATEWAY, error.to_string()),
        WorkflowError::Payload(_) => (StatusCode::BAD_REQUEST, error.to_string()),
        WorkflowError::Session(_) => (StatusCode::BAD_GATEWAY, error.to_string()),
        WorkflowError::Profile(_) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

/// Generate a story for a project
pub async fn generate_story(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<StoryRequest>,
) -> Result<Json<GenerationResponse>, (StatusCode, String)> {
    let project_id = parse_project_id(&project_id)?;
    let outcome = state
        .workflow
        .generate_story(StoryPrompt {
            project_id,
            premise: req.premise,
            genre: req.genre,
            tone: req.tone,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(GenerationResponse::from(outcome)))
}

/// Generate a shot list for one scene
pub async fn generate_shot_list(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<ShotListRequest>,
) -> Result<Json<GenerationResponse>, (StatusCode, String)> {
    let project_id = parse_project_id(&project_id)?;
    let outcome = state
        .workflow
        .generate_shot_list(ShotListPrompt {
            project_id,
            scene_heading: req.scene_heading,
            scene_summary: req.scene_summary,
            style: req.style,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(GenerationResponse::from(outcome)))
}

/// Generate a full photoboard from a shot list
pub async fn generate_photoboard(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<PhotoboardRequest>,
) -> Result<Json<GenerationResponse>, (StatusCode, String)> {
    let project_id = parse_project_id(&project_id)?;
    let outcome = state
        .workflow
        .generate_photoboard(PhotoboardPrompt {
            project_id,
            shots: req
                .shots
                .into_iter()
                .map(|shot| ShotSummary {
                    number: shot.number,
                    description: shot.description,
                })
                .collect(),
            style: req.style,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(GenerationResponse::from(outcome)))
}

/// Render a single photoboard frame
pub async fn generate_frame(
    State(state): State<Arc<AppState>>,
    Path((project_id, shot)): Path<(String, u32)>,
    Json(req): Json<FrameRequest>,
) -> Result<Json<GenerationResponse>, (StatusCode, String)> {
    let project_id = parse_project_id(&project_id)?;
    let outcome = state
        .workflow
        .generate_frame(FramePrompt {
            project_id,
            shot_number: shot,
            description: req.description,
            style: req.style,
            seed: None,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(GenerationResponse::from(outcome)))
}

/// Re-render a frame the user was not happy with
pub async fn regenerate_frame(
    State(state): State<Arc<AppState>>,
    Path((project_id, shot)): Path<(String, u32)>,
    Json(req): Json<FrameRequest>,
) -> Result<Json<GenerationResponse>, (StatusCode, String)> {
    let project_id = parse_project_id(&project_id)?;
    let outcome = state
        .workflow
        .regenerate_frame(FramePrompt {
            project_id,
            shot_number: shot,
            description: req.description,
            style: req.style,
            seed: None,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(GenerationResponse::from(outcome)))
}
