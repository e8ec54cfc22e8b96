//! Application configuration

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Supabase project base URL
    pub supabase_url: String,
    /// Anon (publishable) API key, sent as `apikey` on every request
    pub supabase_anon_key: String,
    /// Service-role key used for PostgREST writes
    pub supabase_service_key: String,
    /// Optional user access token to authenticate the session at startup
    pub access_token: Option<String>,

    /// HTTP server port
    pub server_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| "http://localhost:54321".to_string()),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .context("SUPABASE_ANON_KEY environment variable is required")?,
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .context("SUPABASE_SERVICE_KEY environment variable is required")?,
            access_token: env::var("PREVIZ_ACCESS_TOKEN").ok(),

            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        })
    }
}
