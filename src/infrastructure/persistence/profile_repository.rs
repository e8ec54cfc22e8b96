//! Supabase profile store
//!
//! PostgREST rows for user profiles plus the credit ledger. Every write is
//! a compare-and-set loop: read the row, PATCH filtered on the credits and
//! plan that were read, and retry when the filter matches nothing because
//! another writer got there first. The decrement itself is therefore atomic
//! and the stored balance can never go negative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ports::outbound::{ProfileStoreError, ProfileStorePort, SpendOutcome};
use crate::domain::entities::{CreditLedgerEntry, UserProfile};
use crate::domain::value_objects::{CreditAction, Plan, PlanEvent, SpendContext, UserId};
use crate::infrastructure::persistence::supabase::{SupabaseClient, SupabaseError};

pub const PROFILE_TABLE: &str = "user_profiles";
pub const LEDGER_TABLE: &str = "credit_ledger";

/// Re-reads before giving up on a contended balance
const SPEND_CAS_ATTEMPTS: u32 = 4;

pub struct SupabaseProfileRepository {
    client: SupabaseClient,
}

impl SupabaseProfileRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn fetch_row(&self, user_id: UserId) -> Result<Option<ProfileRow>, ProfileStoreError> {
        let request = self.client.rest_get(PROFILE_TABLE).query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("select", "*".to_string()),
        ]);
        let response = self
            .client
            .send_checked(request)
            .await
            .map_err(|e| ProfileStoreError::Backend(e.to_string()))?;

        let mut rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| ProfileStoreError::Serialization(e.to_string()))?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// PATCH the profile row, conditioned on the credits and plan that were
    /// just read. Returns `None` when the filter matched nothing, i.e. the
    /// CAS lost.
    async fn patch_if_unchanged(
        &self,
        read: &UserProfile,
        changes: serde_json::Value,
    ) -> Result<Option<UserProfile>, ProfileStoreError> {
        let request = self
            .client
            .rest_patch(PROFILE_TABLE)
            .query(&cas_filter(read))
            .json(&changes);
        let response = self
            .client
            .send_checked(request)
            .await
            .map_err(|e| ProfileStoreError::Backend(e.to_string()))?;

        let rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| ProfileStoreError::Serialization(e.to_string()))?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_profile()?)),
            None => Ok(None),
        }
    }

    /// Ledger appends are best-effort: the balance PATCH already committed,
    /// so a failure here loses an audit line, not money.
    async fn append_ledger(&self, entry: &CreditLedgerEntry) {
        let request = self
            .client
            .rest_post(LEDGER_TABLE)
            .json(&LedgerRow::from_entry(entry));
        if let Err(error) = self.client.send_checked(request).await {
            tracing::warn!(%error, entry_id = %entry.id, "Failed to append credit ledger entry");
        }
    }
}

#[async_trait]
impl ProfileStorePort for SupabaseProfileRepository {
    async fn fetch(&self, user_id: UserId) -> Result<Option<UserProfile>, ProfileStoreError> {
        match self.fetch_row(user_id).await? {
            Some(row) => Ok(Some(row.into_profile()?)),
            None => Ok(None),
        }
    }

    async fn create_default(&self, user_id: UserId) -> Result<UserProfile, ProfileStoreError> {
        let profile = UserProfile::new_default(user_id);
        let request = self
            .client
            .rest_post(PROFILE_TABLE)
            .json(&ProfileRow::from_profile(&profile));

        let response = match self.client.send_checked(request).await {
            Ok(response) => response,
            // 409 means another writer inserted the row between our fetch
            // and this insert; theirs is the real one
            Err(SupabaseError::Api { status: 409, .. }) => {
                return self
                    .fetch(user_id)
                    .await?
                    .ok_or(ProfileStoreError::NotFound(user_id));
            }
            Err(error) => return Err(ProfileStoreError::Backend(error.to_string())),
        };

        let rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| ProfileStoreError::Serialization(e.to_string()))?;
        match rows.into_iter().next() {
            Some(row) => row.into_profile(),
            None => Ok(profile),
        }
    }

    async fn try_spend(
        &self,
        user_id: UserId,
        action: CreditAction,
        cost: u32,
        context: &SpendContext,
    ) -> Result<SpendOutcome, ProfileStoreError> {
        for _ in 0..SPEND_CAS_ATTEMPTS {
            let current = self
                .fetch(user_id)
                .await?
                .ok_or(ProfileStoreError::NotFound(user_id))?;

            if current.credits < cost {
                return Ok(SpendOutcome::InsufficientFunds {
                    current: current.credits,
                });
            }

            let remaining = current.credits - cost;
            let changes = serde_json::json!({
                "credits": remaining,
                "updated_at": Utc::now(),
            });
            match self.patch_if_unchanged(&current, changes).await? {
                Some(profile) => {
                    let entry =
                        CreditLedgerEntry::record(user_id, action, cost, profile.credits, context);
                    self.append_ledger(&entry).await;
                    return Ok(SpendOutcome::Spent { profile, entry });
                }
                None => {
                    tracing::debug!(user_id = %user_id, "Spend lost a write race, re-reading");
                }
            }
        }
        Err(ProfileStoreError::Contention(user_id))
    }

    async fn apply_grant(
        &self,
        user_id: UserId,
        event: &PlanEvent,
    ) -> Result<UserProfile, ProfileStoreError> {
        for _ in 0..SPEND_CAS_ATTEMPTS {
            let current = self
                .fetch(user_id)
                .await?
                .ok_or(ProfileStoreError::NotFound(user_id))?;

            let credits = current.credits.saturating_add(event.credit_grant);
            let plan = event.plan.unwrap_or(current.plan);
            let changes = serde_json::json!({
                "credits": credits,
                "plan": plan.as_str(),
                "updated_at": Utc::now(),
            });
            if let Some(profile) = self.patch_if_unchanged(&current, changes).await? {
                return Ok(profile);
            }
            tracing::debug!(user_id = %user_id, "Grant lost a write race, re-reading");
        }
        Err(ProfileStoreError::Contention(user_id))
    }
}

/// Filter for a conditional profile PATCH. Besides the row key, the row
/// must still carry the credits and the plan the caller read: a writer
/// whose read went stale matches nothing, even when only the plan moved
/// and the balance stayed put.
fn cas_filter(read: &UserProfile) -> [(&'static str, String); 3] {
    [
        ("user_id", format!("eq.{}", read.user_id)),
        ("credits", format!("eq.{}", read.credits)),
        ("plan", format!("eq.{}", read.plan.as_str())),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct ProfileRow {
    user_id: Uuid,
    credits: i64,
    plan: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProfileRow {
    fn from_profile(profile: &UserProfile) -> Self {
        Self {
            user_id: *profile.user_id.as_uuid(),
            credits: i64::from(profile.credits),
            plan: profile.plan.as_str().to_string(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }

    fn into_profile(self) -> Result<UserProfile, ProfileStoreError> {
        let plan = self
            .plan
            .parse::<Plan>()
            .map_err(|e| ProfileStoreError::Serialization(e.to_string()))?;
        let credits = u32::try_from(self.credits).map_err(|_| {
            ProfileStoreError::Serialization(format!(
                "stored credit balance {} is out of range",
                self.credits
            ))
        })?;
        Ok(UserProfile {
            user_id: UserId::from(self.user_id),
            credits,
            plan,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Serialize)]
struct LedgerRow {
    id: Uuid,
    user_id: Uuid,
    action: String,
    cost: i64,
    balance_after: i64,
    project_id: Option<Uuid>,
    request_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl LedgerRow {
    fn from_entry(entry: &CreditLedgerEntry) -> Self {
        Self {
            id: *entry.id.as_uuid(),
            user_id: *entry.user_id.as_uuid(),
            action: entry.action.as_str().to_string(),
            cost: i64::from(entry.cost),
            balance_after: i64::from(entry.balance_after),
            project_id: entry.project_id.map(|id| *id.as_uuid()),
            request_id: entry.request_id.map(|id| *id.as_uuid()),
            created_at: entry.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_round_trips_profile() {
        let profile = UserProfile::new_default(UserId::new());
        let row = ProfileRow::from_profile(&profile);
        let parsed = row.into_profile().unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_conditional_patch_pins_plan_as_well_as_credits() {
        let mut profile = UserProfile::new_default(UserId::new());
        profile.credits = 40;
        profile.plan = Plan::Pro;

        // A writer that read the row before a plan change must miss the
        // filter even when the balance is unchanged.
        let filter = cas_filter(&profile);
        assert_eq!(filter[0], ("user_id", format!("eq.{}", profile.user_id)));
        assert_eq!(filter[1], ("credits", "eq.40".to_string()));
        assert_eq!(filter[2], ("plan", "eq.pro".to_string()));
    }

    #[test]
    fn test_row_rejects_unknown_plan() {
        let row = ProfileRow {
            user_id: Uuid::new_v4(),
            credits: 10,
            plan: "platinum".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            row.into_profile(),
            Err(ProfileStoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_row_rejects_negative_balance() {
        let row = ProfileRow {
            user_id: Uuid::new_v4(),
            credits: -5,
            plan: "free".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            row.into_profile(),
            Err(ProfileStoreError::Serialization(_))
        ));
    }
}
