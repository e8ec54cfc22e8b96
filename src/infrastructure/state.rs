//! Shared application state

use std::sync::Arc;

use anyhow::Result;

use crate::application::services::{
    CreditGate, GenerationClient, GenerationWorkflow, ProfileService,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::generation::EdgeFunctionClient;
use crate::infrastructure::persistence::{
    SupabaseArtifactRepository, SupabaseClient, SupabaseProfileRepository,
};
use crate::infrastructure::session::GoTrueSessionClient;

// Concrete service types over the Supabase adapters
pub type Profiles = ProfileService<SupabaseProfileRepository>;
pub type Gate = CreditGate<GoTrueSessionClient, SupabaseProfileRepository>;
pub type Workflow = GenerationWorkflow<
    GoTrueSessionClient,
    SupabaseProfileRepository,
    EdgeFunctionClient,
    SupabaseArtifactRepository,
>;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub session: Arc<GoTrueSessionClient>,
    pub profiles: Arc<Profiles>,
    pub credit_gate: Arc<Gate>,
    pub workflow: Arc<Workflow>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let supabase = SupabaseClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
            &config.supabase_service_key,
        );

        // Outbound adapters
        let session = Arc::new(GoTrueSessionClient::new(
            supabase.clone(),
            config.access_token.clone(),
        ));
        let profile_store = Arc::new(SupabaseProfileRepository::new(supabase.clone()));
        let artifact_store = Arc::new(SupabaseArtifactRepository::new(supabase.clone()));
        let endpoint = Arc::new(EdgeFunctionClient::new(supabase));

        // Application services
        let profiles = Arc::new(ProfileService::new(profile_store));
        let credit_gate = Arc::new(CreditGate::new(session.clone(), profiles.clone()));
        let generator = Arc::new(GenerationClient::new(endpoint));
        let workflow = Arc::new(GenerationWorkflow::new(
            credit_gate.clone(),
            generator,
            artifact_store,
        ));

        // Resolve the startup identity; a failure here is not fatal, the
        // refresh worker keeps trying
        if let Err(error) = session.refresh_identity().await {
            tracing::warn!(%error, "Could not resolve session identity at startup");
        }

        Ok(Self {
            config,
            session,
            profiles,
            credit_gate,
            workflow,
        })
    }
}
