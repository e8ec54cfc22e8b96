//! Edge Function generation endpoint
//!
//! Each credit action maps to one Supabase Edge Function. Functions answer
//! with an envelope `{ success, data, error, timestamp }`; `success: false`
//! is an explicit rejection and is never retried upstream, while transport
//! failures and 5xx answers surface as transient errors the caller may
//! retry. A success answer must carry both `data` and `timestamp`; anything
//! less is malformed and not retried either.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::application::ports::outbound::{EndpointError, EndpointReply, GenerationEndpointPort};
use crate::domain::value_objects::CreditAction;
use crate::infrastructure::persistence::SupabaseClient;

/// Bound on a single function invocation
const FUNCTION_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Edge Function slug for an action. Frame renders and re-renders share
/// one function; the payload seed is what differs.
pub fn function_slug(action: CreditAction) -> &'static str {
    match action {
        CreditAction::StoryGeneration => "generate-story",
        CreditAction::ShotListGeneration => "generate-shot-list",
        CreditAction::PhotoboardGeneration => "generate-photoboard",
        CreditAction::PhotoboardFrame | CreditAction::PhotoboardRegeneration => "generate-frame",
    }
}

pub struct EdgeFunctionClient {
    client: SupabaseClient,
}

impl EdgeFunctionClient {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GenerationEndpointPort for EdgeFunctionClient {
    async fn submit(
        &self,
        action: CreditAction,
        payload: &serde_json::Value,
    ) -> Result<EndpointReply, EndpointError> {
        let slug = function_slug(action);
        let response = self
            .client
            .http()
            .post(self.client.function_url(slug))
            .header("apikey", self.client.anon_key())
            .bearer_auth(self.client.anon_key())
            .timeout(FUNCTION_REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EndpointError::Timeout
                } else {
                    EndpointError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EndpointError::Unavailable {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::Rejected {
                message: if body.is_empty() {
                    format!("function {} answered HTTP {}", slug, status)
                } else {
                    body
                },
            });
        }

        let envelope: FunctionEnvelope = response
            .json()
            .await
            .map_err(|e| EndpointError::Malformed(e.to_string()))?;
        reply_from_envelope(envelope)
    }
}

#[derive(Debug, Deserialize)]
struct FunctionEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

fn reply_from_envelope(envelope: FunctionEnvelope) -> Result<EndpointReply, EndpointError> {
    if !envelope.success {
        return Err(EndpointError::Rejected {
            message: envelope
                .error
                .unwrap_or_else(|| "generation failed".to_string()),
        });
    }
    let data = envelope
        .data
        .ok_or_else(|| EndpointError::Malformed("success reply carries no data".to_string()))?;
    let timestamp = envelope
        .timestamp
        .ok_or_else(|| EndpointError::Malformed("success reply carries no timestamp".to_string()))?;
    Ok(EndpointReply { data, timestamp })
}
