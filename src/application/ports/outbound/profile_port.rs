use async_trait::async_trait;

use crate::domain::entities::{CreditLedgerEntry, UserProfile};
use crate::domain::value_objects::{CreditAction, PlanEvent, SpendContext, UserId};

#[derive(Debug, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("Persistence error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("No profile for user {0}")]
    NotFound(UserId),
    #[error("Gave up after repeated concurrent updates for user {0}")]
    Contention(UserId),
}

/// Result of a conditional spend
#[derive(Debug, Clone)]
pub enum SpendOutcome {
    /// The decrement committed; `profile` carries the new balance
    Spent {
        profile: UserProfile,
        entry: CreditLedgerEntry,
    },
    /// The balance at commit time no longer covered the cost
    InsufficientFunds { current: u32 },
}

/// Durable storage for profiles and the credit ledger
///
/// `try_spend` is the only consumption-path write and must be atomic: the
/// decrement commits only if the stored balance still covers the cost at
/// that instant, so two racing spends can never drive the balance negative.
/// Concurrent increases (grants) are tolerated by re-reading and retrying.
#[async_trait]
pub trait ProfileStorePort: Send + Sync {
    async fn fetch(&self, user_id: UserId) -> Result<Option<UserProfile>, ProfileStoreError>;

    /// Insert the starting profile for a first-time user
    async fn create_default(&self, user_id: UserId) -> Result<UserProfile, ProfileStoreError>;

    /// Conditionally decrement the balance and append a ledger entry
    async fn try_spend(
        &self,
        user_id: UserId,
        action: CreditAction,
        cost: u32,
        context: &SpendContext,
    ) -> Result<SpendOutcome, ProfileStoreError>;

    /// Apply a confirmed billing event (credit grant and/or plan change)
    async fn apply_grant(
        &self,
        user_id: UserId,
        event: &PlanEvent,
    ) -> Result<UserProfile, ProfileStoreError>;
}
