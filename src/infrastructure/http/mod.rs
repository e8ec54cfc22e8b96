//! HTTP REST API routes

mod billing_routes;
mod generation_routes;
mod profile_routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::infrastructure::state::AppState;

pub use billing_routes::*;
pub use generation_routes::*;
pub use profile_routes::*;

/// Create all API routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Profile and credit routes
        .route("/api/profile", get(profile_routes::get_profile))
        .route("/api/profile/balance", get(profile_routes::get_balance))
        .route(
            "/api/profile/validate/{action}",
            get(profile_routes::validate_action),
        )
        .route("/api/credits/costs", get(profile_routes::list_action_costs))
        .route("/api/credits/gate", get(profile_routes::get_gate_state))
        // Generation routes
        .route(
            "/api/projects/{project_id}/story",
            post(generation_routes::generate_story),
        )
        .route(
            "/api/projects/{project_id}/shot-list",
            post(generation_routes::generate_shot_list),
        )
        .route(
            "/api/projects/{project_id}/photoboard",
            post(generation_routes::generate_photoboard),
        )
        .route(
            "/api/projects/{project_id}/photoboard/frames/{shot}",
            post(generation_routes::generate_frame),
        )
        .route(
            "/api/projects/{project_id}/photoboard/frames/{shot}/regenerate",
            post(generation_routes::regenerate_frame),
        )
        // Billing routes
        .route(
            "/api/billing/events",
            post(billing_routes::apply_billing_event),
        )
}
