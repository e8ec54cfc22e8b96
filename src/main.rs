//! Previz Engine - Backend API for AI film pre-production
//!
//! The engine is the backend server that:
//! - Gates every AI generation behind the user's credit balance
//! - Runs generations through Supabase Edge Functions with caching and retry
//! - Persists profiles, the credit ledger and generated artifacts via PostgREST

mod application;
mod domain;
mod infrastructure;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::application::ports::outbound::SessionPort;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http;
use crate::infrastructure::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "previz_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Previz Engine");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Supabase: {}", config.supabase_url);

    // Initialize application state
    let state = AppState::new(config).await?;
    let state = Arc::new(state);
    tracing::info!("Application state initialized");

    // Session refresh worker (re-validates the access token periodically)
    let session_worker = {
        let session = state.session.clone();
        tokio::spawn(async move {
            tracing::info!("Starting session refresh worker");
            session.run_refresh_worker().await;
        })
    };

    // Identity worker (resets cached balance state when the session changes)
    let identity_worker = {
        let mut identities = state.session.subscribe();
        let profiles = state.profiles.clone();
        tokio::spawn(async move {
            let mut last_user = identities.borrow().as_ref().map(|user| user.id);
            while identities.changed().await.is_ok() {
                let user = identities.borrow().as_ref().map(|user| user.id);
                if user != last_user {
                    tracing::info!("Session identity changed, resetting cached profile state");
                    profiles.reset().await;
                    if let Some(user_id) = user {
                        if let Err(e) = profiles.refresh(user_id).await {
                            tracing::warn!("Failed to load profile for new session: {}", e);
                        }
                    }
                    last_user = user;
                }
            }
        })
    };

    tracing::info!("Background workers started");

    // Build the router
    let app = Router::new()
        .route("/health", get(health_check))
        // Merge REST API routes
        .merge(http::create_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    let server = axum::serve(listener, app);

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping workers...");
            session_worker.abort();
            identity_worker.abort();
            tracing::info!("Workers stopped");
        }
    }

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
