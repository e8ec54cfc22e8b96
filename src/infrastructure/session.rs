//! GoTrue session adapter
//!
//! Resolves the ambient identity by asking Supabase Auth who the configured
//! access token belongs to. The answer is cached in a watch channel so the
//! hot path never blocks on the network; a background worker re-checks
//! periodically and publishes sign-outs when the token stops being accepted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::application::ports::outbound::{AuthenticatedUser, SessionError, SessionPort};
use crate::domain::value_objects::UserId;
use crate::infrastructure::persistence::SupabaseClient;

/// How often the background worker re-validates the token
pub const SESSION_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
/// Bound on a single auth round trip
const AUTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GoTrueSessionClient {
    client: SupabaseClient,
    access_token: Option<String>,
    current_tx: watch::Sender<Option<AuthenticatedUser>>,
}

impl GoTrueSessionClient {
    pub fn new(client: SupabaseClient, access_token: Option<String>) -> Self {
        let (current_tx, _) = watch::channel(None);
        Self {
            client,
            access_token,
            current_tx,
        }
    }

    /// Ask GoTrue who the token belongs to and publish the answer.
    ///
    /// A 401 is a signed-out session, not a failure: the token expired or
    /// was revoked. Only transport and server errors surface as `Err`.
    pub async fn refresh_identity(&self) -> Result<Option<AuthenticatedUser>, SessionError> {
        let Some(token) = self.access_token.as_deref() else {
            self.current_tx.send_replace(None);
            return Ok(None);
        };

        let response = self
            .client
            .http()
            .get(self.client.auth_url("user"))
            .header("apikey", self.client.anon_key())
            .bearer_auth(token)
            .timeout(AUTH_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SessionError::Provider(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!("Access token no longer accepted, treating session as signed out");
            self.current_tx.send_replace(None);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SessionError::Provider(format!(
                "auth endpoint answered HTTP {}",
                response.status()
            )));
        }

        let gotrue_user: GoTrueUser = response
            .json()
            .await
            .map_err(|e| SessionError::Provider(e.to_string()))?;
        let user = AuthenticatedUser {
            id: UserId::from(gotrue_user.id),
            email: gotrue_user.email,
            created_at: gotrue_user.created_at,
        };

        let changed = self.current_tx.borrow().as_ref() != Some(&user);
        if changed {
            tracing::info!(user_id = %user.id, "Session identity resolved");
        }
        self.current_tx.send_replace(Some(user.clone()));
        Ok(Some(user))
    }

    /// Periodic re-validation loop, spawned once at startup
    pub async fn run_refresh_worker(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(SESSION_REFRESH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(error) = self.refresh_identity().await {
                tracing::warn!(%error, "Session refresh failed, keeping last known identity");
            }
        }
    }
}

#[async_trait]
impl SessionPort for GoTrueSessionClient {
    async fn current_user(&self) -> Result<Option<AuthenticatedUser>, SessionError> {
        // Serve the cached identity when we have one; only go to the
        // network when the last answer was "nobody"
        let cached = self.current_tx.borrow().clone();
        if let Some(user) = cached {
            return Ok(Some(user));
        }
        self.refresh_identity().await
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthenticatedUser>> {
        self.current_tx.subscribe()
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    created_at: DateTime<Utc>,
}
