//! Profile, balance and credit validation API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::application::ports::outbound::{AuthenticatedUser, SessionPort};
use crate::application::services::{BalanceSnapshot, CreditGateError, GateState, ValidationResult};
use crate::domain::entities::UserProfile;
use crate::domain::value_objects::CreditAction;
use crate::infrastructure::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub credits: u32,
    pub plan: String,
    /// Maximum projects for the plan, absent when unlimited
    pub project_limit: Option<u32>,
    /// When the auth account was created, as reported by the session
    pub account_created_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProfileResponse {
    fn new(user: &AuthenticatedUser, profile: UserProfile) -> Self {
        Self {
            user_id: profile.user_id.to_string(),
            email: user.email.clone(),
            credits: profile.credits,
            plan: profile.plan.as_str().to_string(),
            project_limit: profile.plan.project_limit(),
            account_created_at: user.created_at.to_rfc3339(),
            created_at: profile.created_at.to_rfc3339(),
            updated_at: profile.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActionCost {
    pub action: CreditAction,
    pub cost: u32,
}

/// Get the signed-in user's profile, creating the default one on first use
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let user = state
        .session
        .current_user()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "No authenticated session".to_string(),
        ))?;

    let profile = state
        .profiles
        .current(user.id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ProfileResponse::new(&user, profile)))
}

/// Latest published balance snapshot. 404 until a profile has been read.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BalanceSnapshot>, (StatusCode, String)> {
    let snapshot = state.profiles.subscribe_balance().borrow().clone();
    snapshot.map(Json).ok_or((
        StatusCode::NOT_FOUND,
        "No balance published yet".to_string(),
    ))
}

/// The full pricing table, one entry per billable action
pub async fn list_action_costs() -> Json<Vec<ActionCost>> {
    let costs = CreditAction::ALL
        .iter()
        .map(|&action| ActionCost {
            action,
            cost: action.cost(),
        })
        .collect();
    Json(costs)
}

/// Where the most recent gated credit flow stands
pub async fn get_gate_state(State(state): State<Arc<AppState>>) -> Json<GateState> {
    Json(state.credit_gate.subscribe().borrow().clone())
}

/// Check whether the signed-in user can afford an action
pub async fn validate_action(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
) -> Result<Json<ValidationResult>, (StatusCode, String)> {
    let action = action
        .parse::<CreditAction>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let result = state
        .credit_gate
        .validate(action)
        .await
        .map_err(|e| match e {
            CreditGateError::NotAuthenticated => (StatusCode::UNAUTHORIZED, e.to_string()),
            CreditGateError::Session(_) => (StatusCode::BAD_GATEWAY, e.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        })?;

    Ok(Json(result))
}
