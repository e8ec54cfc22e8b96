//! Billing event API routes
//!
//! The payment provider's webhook relay posts confirmed purchases here.
//! The route never talks to the payment provider; it only applies the
//! already-confirmed effect (plan change, credit grant) to the profile.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::outbound::ProfileStoreError;
use crate::domain::value_objects::{Plan, PlanEvent, UserId};
use crate::infrastructure::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BillingEventRequest {
    pub user_id: String,
    /// New plan tier, absent for a pure credit top-up
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub credit_grant: u32,
}

#[derive(Debug, Serialize)]
pub struct BillingEventResponse {
    pub user_id: String,
    pub credits: u32,
    pub plan: String,
}

/// Apply a confirmed payment effect to a user's profile
pub async fn apply_billing_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BillingEventRequest>,
) -> Result<Json<BillingEventResponse>, (StatusCode, String)> {
    let user_id = Uuid::parse_str(&req.user_id)
        .map(UserId::from)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid user ID".to_string()))?;

    let plan = match req.plan.as_deref() {
        Some(raw) => Some(
            raw.parse::<Plan>()
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        ),
        None => None,
    };
    let event = PlanEvent {
        plan,
        credit_grant: req.credit_grant,
    };

    let profile = state
        .profiles
        .apply_external_grant(user_id, &event)
        .await
        .map_err(|e| match e {
            ProfileStoreError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        })?;

    Ok(Json(BillingEventResponse {
        user_id: profile.user_id.to_string(),
        credits: profile.credits,
        plan: profile.plan.as_str().to_string(),
    }))
}
