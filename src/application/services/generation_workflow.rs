//! Generation Workflow - The full request → generate → deduct → persist flow
//!
//! Order matters and is fixed:
//! 1. Validate the balance up front, before any network call
//! 2. Run the generation; a failure here ends the flow, nobody is charged
//! 3. Deduct credits; a failure here is flagged on the outcome but the
//!    artifact survives, the user already paid the wait for it
//! 4. Persist the artifact; a failure here is also carried on the outcome
//!    rather than thrown, so callers can still hand the content back
//!
//! Cache hits are billed like any other success; the credit buys the
//! artifact, not the network round trip.

use std::sync::Arc;

use crate::application::dto::{
    FramePrompt, GenerationPrompt, PhotoboardPrompt, ShotListPrompt, StoryPrompt,
};
use crate::application::ports::outbound::{
    ArtifactStorePort, GenerationEndpointPort, ProfileStorePort, SessionPort,
};
use crate::application::services::credit_gate::{CreditGate, CreditGateError, ValidationResult};
use crate::application::services::generation_client::{GenerationClient, GenerationError};
use crate::domain::entities::{ArtifactRecord, GeneratedArtifact};
use crate::domain::value_objects::{CreditAction, RequestId, SpendContext};

/// Everything a caller needs to know about a finished generation
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub artifact: GeneratedArtifact,
    pub record: PersistOutcome,
    /// True when generation succeeded but the deduction did not land.
    /// The artifact is kept either way.
    pub credit_deduction_failed: bool,
    /// Balance after deduction, when the store reported one
    pub remaining_credits: Option<u32>,
    pub from_cache: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Stored(ArtifactRecord),
    Failed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("No authenticated session")]
    NotAuthenticated,
    #[error("{}", .0.message.as_deref().unwrap_or("Credit validation failed"))]
    Blocked(ValidationResult),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("Invalid prompt payload: {0}")]
    Payload(String),
    #[error("Session error: {0}")]
    Session(String),
    #[error("Profile store error: {0}")]
    Profile(String),
}

impl From<CreditGateError> for WorkflowError {
    fn from(error: CreditGateError) -> Self {
        match error {
            CreditGateError::NotAuthenticated => WorkflowError::NotAuthenticated,
            CreditGateError::InsufficientCredits { required, current } => {
                WorkflowError::Blocked(ValidationResult {
                    is_valid: false,
                    required_credits: required,
                    current_credits: current,
                    message: Some(format!(
                        "Insufficient credits: need {}, have {}",
                        required, current
                    )),
                })
            }
            CreditGateError::Session(error) => WorkflowError::Session(error.to_string()),
            CreditGateError::Store(error) => WorkflowError::Profile(error.to_string()),
        }
    }
}

pub struct GenerationWorkflow<S, P, E, A>
where
    S: SessionPort,
    P: ProfileStorePort,
    E: GenerationEndpointPort,
    A: ArtifactStorePort,
{
    gate: Arc<CreditGate<S, P>>,
    generator: Arc<GenerationClient<E>>,
    artifacts: Arc<A>,
}

impl<S, P, E, A> GenerationWorkflow<S, P, E, A>
where
    S: SessionPort,
    P: ProfileStorePort,
    E: GenerationEndpointPort,
    A: ArtifactStorePort,
{
    pub fn new(
        gate: Arc<CreditGate<S, P>>,
        generator: Arc<GenerationClient<E>>,
        artifacts: Arc<A>,
    ) -> Self {
        Self {
            gate,
            generator,
            artifacts,
        }
    }

    pub async fn generate_story(
        &self,
        prompt: StoryPrompt,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.run(GenerationPrompt::Story(prompt)).await
    }

    pub async fn generate_shot_list(
        &self,
        prompt: ShotListPrompt,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.run(GenerationPrompt::ShotList(prompt)).await
    }

    pub async fn generate_photoboard(
        &self,
        prompt: PhotoboardPrompt,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.run(GenerationPrompt::Photoboard(prompt)).await
    }

    pub async fn generate_frame(
        &self,
        prompt: FramePrompt,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.run(GenerationPrompt::Frame(prompt)).await
    }

    /// Re-render one frame, bypassing anything previously cached for it.
    ///
    /// Drops the cached frame replies for the project and stamps a fresh
    /// seed, otherwise an identical prompt would be served straight back
    /// from the cache.
    pub async fn regenerate_frame(
        &self,
        mut prompt: FramePrompt,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.generator
            .invalidate(CreditAction::PhotoboardFrame, Some(prompt.project_id));
        self.generator
            .invalidate(CreditAction::PhotoboardRegeneration, Some(prompt.project_id));
        prompt.seed = Some(rand::random());
        self.run(GenerationPrompt::Regenerate(prompt)).await
    }

    pub async fn run(&self, prompt: GenerationPrompt) -> Result<WorkflowOutcome, WorkflowError> {
        let action = prompt.action();
        let project_id = prompt.project_id();

        let validation = self.gate.validate(action).await?;
        if !validation.is_valid {
            return Err(WorkflowError::Blocked(validation));
        }

        let payload = prompt
            .to_payload()
            .map_err(|error| WorkflowError::Payload(error.to_string()))?;

        // Generate first. If this fails, the flow ends with no deduction.
        let reply = self.generator.request(action, payload).await?;

        let context = SpendContext::for_project(project_id, RequestId::new());
        let (credit_deduction_failed, remaining_credits) =
            match self.gate.deduct(action, context).await {
                Ok(receipt) => {
                    tracing::debug!(
                        entry_id = %receipt.entry.id,
                        action = %receipt.action,
                        cost = receipt.cost,
                        remaining = receipt.remaining,
                        "Deduction recorded"
                    );
                    (false, Some(receipt.remaining))
                }
                Err(CreditGateError::InsufficientCredits { required, current }) => {
                    // A concurrent spend won the balance between validation
                    // and here. The artifact exists; keep it and flag the miss.
                    tracing::warn!(
                        action = %action,
                        required,
                        current,
                        "Deduction lost the balance re-check, keeping artifact"
                    );
                    (true, Some(current))
                }
                Err(error) => {
                    tracing::warn!(
                        action = %action,
                        %error,
                        "Credit deduction failed, keeping artifact"
                    );
                    (true, None)
                }
            };

        let record = match self.artifacts.save_artifact(project_id, &reply.artifact).await {
            Ok(record) => PersistOutcome::Stored(record),
            Err(error) => {
                tracing::error!(
                    action = %action,
                    project_id = %project_id,
                    %error,
                    "Failed to persist generated artifact"
                );
                PersistOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        };

        Ok(WorkflowOutcome {
            artifact: reply.artifact,
            record,
            credit_deduction_failed,
            remaining_credits,
            from_cache: reply.from_cache,
            attempts: reply.attempts,
        })
    }
}
