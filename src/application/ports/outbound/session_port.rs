use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::domain::value_objects::UserId;

/// Identity attached to the current session
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Auth provider error: {0}")]
    Provider(String),
}

/// Access to the ambient authenticated session
///
/// `current_user` returning `Ok(None)` means nobody is signed in; callers
/// must treat that as a hard stop before touching per-user state. Identity
/// changes (sign-in, sign-out, user switch) are published on the watch
/// channel.
#[async_trait]
pub trait SessionPort: Send + Sync {
    async fn current_user(&self) -> Result<Option<AuthenticatedUser>, SessionError>;

    fn subscribe(&self) -> watch::Receiver<Option<AuthenticatedUser>>;
}
