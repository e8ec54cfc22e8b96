//! Profile Service - Cached view over the durable user profile
//!
//! This service owns the process-local copy of the signed-in user's profile:
//! - Creates the profile on the first authenticated touch
//! - Serves cached reads; re-reads through the port on refresh
//! - Publishes balance changes in two phases, tentative then confirmed
//!
//! The cache is a convenience, never an authority. Every number shown as
//! `Confirmed` came out of a port response; `Tentative` values exist only
//! between starting a spend and hearing back from the store, and are rolled
//! back to the last confirmed balance when the spend fails.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, RwLock};

use crate::application::ports::outbound::{ProfileStoreError, ProfileStorePort, SpendOutcome};
use crate::domain::entities::UserProfile;
use crate::domain::value_objects::{CreditAction, Plan, PlanEvent, SpendContext, UserId};

/// Published view of the current balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub user_id: UserId,
    pub credits: u32,
    pub plan: Plan,
    pub phase: BalancePhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePhase {
    /// Optimistic projection, awaiting the store's answer
    Tentative,
    /// Read back from the store
    Confirmed,
}

pub struct ProfileService<P: ProfileStorePort> {
    store: Arc<P>,
    cached: RwLock<Option<UserProfile>>,
    balance_tx: watch::Sender<Option<BalanceSnapshot>>,
}

impl<P: ProfileStorePort> ProfileService<P> {
    pub fn new(store: Arc<P>) -> Self {
        let (balance_tx, _) = watch::channel(None);
        Self {
            store,
            cached: RwLock::new(None),
            balance_tx,
        }
    }

    /// Watch balance snapshots as they change
    pub fn subscribe_balance(&self) -> watch::Receiver<Option<BalanceSnapshot>> {
        self.balance_tx.subscribe()
    }

    /// Current profile for this user, served from cache when possible
    pub async fn current(&self, user_id: UserId) -> Result<UserProfile, ProfileStoreError> {
        {
            let cache = self.cached.read().await;
            if let Some(profile) = cache.as_ref() {
                if profile.user_id == user_id {
                    return Ok(profile.clone());
                }
            }
        }
        self.refresh(user_id).await
    }

    /// Re-read the profile from the store, creating it on first touch
    pub async fn refresh(&self, user_id: UserId) -> Result<UserProfile, ProfileStoreError> {
        let profile = match self.store.fetch(user_id).await? {
            Some(profile) => profile,
            None => {
                tracing::info!(user_id = %user_id, "First session for user, creating default profile");
                self.store.create_default(user_id).await?
            }
        };

        *self.cached.write().await = Some(profile.clone());
        self.publish(&profile, BalancePhase::Confirmed);
        Ok(profile)
    }

    /// Publish the optimistic balance for a spend about to be committed
    pub async fn begin_tentative_spend(&self, user_id: UserId, cost: u32) {
        let cache = self.cached.read().await;
        if let Some(profile) = cache.as_ref() {
            if profile.user_id == user_id {
                let snapshot = BalanceSnapshot {
                    user_id,
                    credits: profile.credits.saturating_sub(cost),
                    plan: profile.plan,
                    phase: BalancePhase::Tentative,
                };
                self.balance_tx.send_replace(Some(snapshot));
            }
        }
    }

    /// Commit a spend through the store and reconcile the cached balance
    ///
    /// Whatever the outcome, the snapshot published afterwards is confirmed:
    /// the new balance on success, the store's current balance on a failed
    /// re-check, or the last confirmed balance when the store errored.
    pub async fn spend(
        &self,
        user_id: UserId,
        action: CreditAction,
        cost: u32,
        context: &SpendContext,
    ) -> Result<SpendOutcome, ProfileStoreError> {
        let outcome = self.store.try_spend(user_id, action, cost, context).await;

        match &outcome {
            Ok(SpendOutcome::Spent { profile, .. }) => {
                *self.cached.write().await = Some(profile.clone());
                self.publish(profile, BalancePhase::Confirmed);
            }
            Ok(SpendOutcome::InsufficientFunds { current }) => {
                let updated = {
                    let mut cache = self.cached.write().await;
                    match cache.as_mut() {
                        Some(profile) if profile.user_id == user_id => {
                            profile.credits = *current;
                            Some(profile.clone())
                        }
                        _ => None,
                    }
                };
                if let Some(profile) = updated {
                    self.publish(&profile, BalancePhase::Confirmed);
                }
            }
            Err(error) => {
                tracing::warn!(user_id = %user_id, error = %error, "Spend failed at the store, rolling back tentative balance");
                self.republish_cached(user_id).await;
            }
        }

        outcome
    }

    /// Apply a confirmed billing event and pick up the new balance
    pub async fn apply_external_grant(
        &self,
        user_id: UserId,
        event: &PlanEvent,
    ) -> Result<UserProfile, ProfileStoreError> {
        let profile = self.store.apply_grant(user_id, event).await?;

        let mut cache = self.cached.write().await;
        let concerns_cached_user = cache
            .as_ref()
            .map(|cached| cached.user_id == user_id)
            .unwrap_or(false);
        if concerns_cached_user {
            *cache = Some(profile.clone());
            drop(cache);
            self.publish(&profile, BalancePhase::Confirmed);
        }

        Ok(profile)
    }

    /// Forget the cached profile, e.g. when the session identity changes
    pub async fn reset(&self) {
        *self.cached.write().await = None;
        self.balance_tx.send_replace(None);
    }

    async fn republish_cached(&self, user_id: UserId) {
        let cache = self.cached.read().await;
        if let Some(profile) = cache.as_ref() {
            if profile.user_id == user_id {
                self.publish(profile, BalancePhase::Confirmed);
            }
        }
    }

    fn publish(&self, profile: &UserProfile, phase: BalancePhase) {
        self.balance_tx.send_replace(Some(BalanceSnapshot {
            user_id: profile.user_id,
            credits: profile.credits,
            plan: profile.plan,
            phase,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::domain::entities::CreditLedgerEntry;

    struct MockStore {
        profile: Mutex<Option<UserProfile>>,
        fetch_calls: AtomicUsize,
        create_calls: AtomicUsize,
        fail_spend: bool,
    }

    impl MockStore {
        fn empty() -> Self {
            Self {
                profile: Mutex::new(None),
                fetch_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
                fail_spend: false,
            }
        }

        fn with_profile(profile: UserProfile) -> Self {
            Self {
                profile: Mutex::new(Some(profile)),
                fetch_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
                fail_spend: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl ProfileStorePort for MockStore {
        async fn fetch(&self, user_id: UserId) -> Result<Option<UserProfile>, ProfileStoreError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .profile
                .lock()
                .unwrap()
                .clone()
                .filter(|p| p.user_id == user_id))
        }

        async fn create_default(
            &self,
            user_id: UserId,
        ) -> Result<UserProfile, ProfileStoreError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let profile = UserProfile::new_default(user_id);
            *self.profile.lock().unwrap() = Some(profile.clone());
            Ok(profile)
        }

        async fn try_spend(
            &self,
            user_id: UserId,
            action: CreditAction,
            cost: u32,
            context: &SpendContext,
        ) -> Result<SpendOutcome, ProfileStoreError> {
            if self.fail_spend {
                return Err(ProfileStoreError::Backend("store offline".to_string()));
            }
            let mut guard = self.profile.lock().unwrap();
            let profile = guard
                .as_mut()
                .filter(|p| p.user_id == user_id)
                .ok_or(ProfileStoreError::NotFound(user_id))?;
            if profile.credits < cost {
                return Ok(SpendOutcome::InsufficientFunds {
                    current: profile.credits,
                });
            }
            profile.credits -= cost;
            let entry =
                CreditLedgerEntry::record(user_id, action, cost, profile.credits, context);
            Ok(SpendOutcome::Spent {
                profile: profile.clone(),
                entry,
            })
        }

        async fn apply_grant(
            &self,
            user_id: UserId,
            event: &PlanEvent,
        ) -> Result<UserProfile, ProfileStoreError> {
            let mut guard = self.profile.lock().unwrap();
            let profile = guard
                .as_mut()
                .filter(|p| p.user_id == user_id)
                .ok_or(ProfileStoreError::NotFound(user_id))?;
            profile.credits += event.credit_grant;
            if let Some(plan) = event.plan {
                profile.plan = plan;
            }
            Ok(profile.clone())
        }
    }

    #[tokio::test]
    async fn test_first_touch_creates_default_profile() {
        let store = Arc::new(MockStore::empty());
        let service = ProfileService::new(store.clone());
        let user_id = UserId::new();

        let profile = service.refresh(user_id).await.unwrap();

        assert_eq!(profile.credits, 100);
        assert_eq!(profile.plan, Plan::Free);
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_current_serves_from_cache() {
        let user_id = UserId::new();
        let store = Arc::new(MockStore::with_profile(UserProfile::new_default(user_id)));
        let service = ProfileService::new(store.clone());

        service.refresh(user_id).await.unwrap();
        service.current(user_id).await.unwrap();
        service.current(user_id).await.unwrap();

        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_external_changes() {
        let user_id = UserId::new();
        let store = Arc::new(MockStore::with_profile(UserProfile::new_default(user_id)));
        let service = ProfileService::new(store.clone());
        service.refresh(user_id).await.unwrap();

        // Another writer (a payment webhook) raises the balance behind our back
        store.profile.lock().unwrap().as_mut().unwrap().credits = 500;

        assert_eq!(service.current(user_id).await.unwrap().credits, 100);
        assert_eq!(service.refresh(user_id).await.unwrap().credits, 500);
    }

    #[tokio::test]
    async fn test_spend_publishes_tentative_then_confirmed() {
        let user_id = UserId::new();
        let store = Arc::new(MockStore::with_profile(UserProfile::new_default(user_id)));
        let service = ProfileService::new(store);
        let rx = service.subscribe_balance();
        service.refresh(user_id).await.unwrap();

        service.begin_tentative_spend(user_id, 30).await;
        {
            let snapshot = rx.borrow().clone().unwrap();
            assert_eq!(snapshot.credits, 70);
            assert_eq!(snapshot.phase, BalancePhase::Tentative);
        }

        let outcome = service
            .spend(
                user_id,
                CreditAction::StoryGeneration,
                30,
                &SpendContext::default(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, SpendOutcome::Spent { .. }));

        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(snapshot.credits, 70);
        assert_eq!(snapshot.phase, BalancePhase::Confirmed);
    }

    #[tokio::test]
    async fn test_failed_recheck_confirms_authoritative_balance() {
        let user_id = UserId::new();
        let mut profile = UserProfile::new_default(user_id);
        profile.credits = 5;
        let store = Arc::new(MockStore::with_profile(profile));
        let service = ProfileService::new(store);
        let rx = service.subscribe_balance();
        service.refresh(user_id).await.unwrap();

        service.begin_tentative_spend(user_id, 10).await;
        let outcome = service
            .spend(
                user_id,
                CreditAction::StoryGeneration,
                10,
                &SpendContext::default(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SpendOutcome::InsufficientFunds { current: 5 }));
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(snapshot.credits, 5);
        assert_eq!(snapshot.phase, BalancePhase::Confirmed);
    }

    #[tokio::test]
    async fn test_store_error_rolls_back_tentative_balance() {
        let user_id = UserId::new();
        let mut store = MockStore::with_profile(UserProfile::new_default(user_id));
        store.fail_spend = true;
        let service = ProfileService::new(Arc::new(store));
        let rx = service.subscribe_balance();
        service.refresh(user_id).await.unwrap();

        service.begin_tentative_spend(user_id, 10).await;
        let result = service
            .spend(
                user_id,
                CreditAction::PhotoboardFrame,
                10,
                &SpendContext::default(),
            )
            .await;

        assert!(result.is_err());
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(snapshot.credits, 100);
        assert_eq!(snapshot.phase, BalancePhase::Confirmed);
    }

    #[tokio::test]
    async fn test_reset_clears_cache_and_snapshot() {
        let user_id = UserId::new();
        let store = Arc::new(MockStore::with_profile(UserProfile::new_default(user_id)));
        let service = ProfileService::new(store.clone());
        let rx = service.subscribe_balance();
        service.refresh(user_id).await.unwrap();

        service.reset().await;

        assert!(rx.borrow().is_none());
        service.current(user_id).await.unwrap();
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_grant_updates_cached_balance() {
        let user_id = UserId::new();
        let store = Arc::new(MockStore::with_profile(UserProfile::new_default(user_id)));
        let service = ProfileService::new(store);
        service.refresh(user_id).await.unwrap();

        let event = PlanEvent {
            plan: Some(Plan::Pro),
            credit_grant: 400,
        };
        let profile = service.apply_external_grant(user_id, &event).await.unwrap();

        assert_eq!(profile.credits, 500);
        assert_eq!(profile.plan, Plan::Pro);
        assert_eq!(service.current(user_id).await.unwrap().credits, 500);
    }
}
