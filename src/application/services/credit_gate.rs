//! Credit Gate - Confirmation and deduction in front of paid actions
//!
//! Every credit-consuming feature goes through this gate twice:
//! - `validate` before showing the confirmation dialog: a read-only check
//!   of the current balance against the action's cost
//! - `deduct` once the user confirms: the commit, re-checked atomically at
//!   the store so a stale validation can never overdraw the balance
//!
//! Gate progress is published on a watch channel for anything rendering
//! confirmation state. Per-call return values stay authoritative; the
//! channel only mirrors the most recent flow.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::application::ports::outbound::{
    ProfileStoreError, ProfileStorePort, SessionError, SessionPort, SpendOutcome,
};
use crate::application::services::profile_service::ProfileService;
use crate::domain::entities::CreditLedgerEntry;
use crate::domain::value_objects::{is_sufficient, CreditAction, Plan, SpendContext};

/// Where the most recent gated flow stands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    Idle,
    Validating {
        action: CreditAction,
    },
    /// Validation failed; the caller should offer an upgrade instead
    Blocked {
        result: ValidationResult,
        upgrade_to: Option<Plan>,
    },
    /// Validation passed; awaiting user confirmation
    Confirmable {
        result: ValidationResult,
    },
    Proceeding {
        action: CreditAction,
    },
    Committed {
        action: CreditAction,
        remaining: u32,
    },
    Failed {
        action: CreditAction,
        reason: String,
    },
}

/// Outcome of a pre-flight validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub required_credits: u32,
    pub current_credits: u32,
    /// Set only when invalid
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreditGateError {
    #[error("No authenticated session")]
    NotAuthenticated,
    #[error("Insufficient credits: need {required}, have {current}")]
    InsufficientCredits { required: u32, current: u32 },
    #[error("Profile store error: {0}")]
    Store(#[from] ProfileStoreError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Receipt for a committed deduction
#[derive(Debug, Clone)]
pub struct DeductReceipt {
    pub action: CreditAction,
    pub cost: u32,
    pub remaining: u32,
    pub entry: CreditLedgerEntry,
}

pub struct CreditGate<S: SessionPort, P: ProfileStorePort> {
    session: Arc<S>,
    profiles: Arc<ProfileService<P>>,
    state_tx: watch::Sender<GateState>,
}

impl<S: SessionPort, P: ProfileStorePort> CreditGate<S, P> {
    pub fn new(session: Arc<S>, profiles: Arc<ProfileService<P>>) -> Self {
        let (state_tx, _) = watch::channel(GateState::Idle);
        Self {
            session,
            profiles,
            state_tx,
        }
    }

    /// Watch gate state transitions
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state_tx.subscribe()
    }

    /// Check whether the signed-in user can afford an action
    ///
    /// Read-only and safe to repeat: absent balance changes, calling this
    /// any number of times returns the same result. Unauthenticated callers
    /// are refused before the profile store is touched.
    pub async fn validate(
        &self,
        action: CreditAction,
    ) -> Result<ValidationResult, CreditGateError> {
        let user = self
            .session
            .current_user()
            .await?
            .ok_or(CreditGateError::NotAuthenticated)?;

        self.state_tx.send_replace(GateState::Validating { action });

        let profile = self.profiles.current(user.id).await?;
        let required = action.cost();
        let current = profile.credits;

        let result = if is_sufficient(current, action) {
            ValidationResult {
                is_valid: true,
                required_credits: required,
                current_credits: current,
                message: None,
            }
        } else {
            ValidationResult {
                is_valid: false,
                required_credits: required,
                current_credits: current,
                message: Some(format!(
                    "Insufficient credits: need {}, have {}",
                    required, current
                )),
            }
        };

        let next = if result.is_valid {
            GateState::Confirmable {
                result: result.clone(),
            }
        } else {
            tracing::debug!(
                action = %action,
                required,
                current,
                "Validation blocked, suggesting upgrade"
            );
            GateState::Blocked {
                result: result.clone(),
                upgrade_to: profile.plan.next_tier(),
            }
        };
        self.state_tx.send_replace(next);

        Ok(result)
    }

    /// Commit the deduction for a confirmed action
    ///
    /// The balance check is re-run inside the store's conditional update, so
    /// two flows racing past `validate` cannot both win here. A lost re-check
    /// comes back as `InsufficientCredits` with nothing written.
    pub async fn deduct(
        &self,
        action: CreditAction,
        context: SpendContext,
    ) -> Result<DeductReceipt, CreditGateError> {
        let user = self
            .session
            .current_user()
            .await?
            .ok_or(CreditGateError::NotAuthenticated)?;

        self.state_tx.send_replace(GateState::Proceeding { action });

        let cost = action.cost();
        self.profiles.begin_tentative_spend(user.id, cost).await;

        match self.profiles.spend(user.id, action, cost, &context).await {
            Ok(SpendOutcome::Spent { profile, entry }) => {
                tracing::info!(
                    user_id = %user.id,
                    action = %action,
                    cost,
                    remaining = profile.credits,
                    "Credits deducted"
                );
                self.state_tx.send_replace(GateState::Committed {
                    action,
                    remaining: profile.credits,
                });
                Ok(DeductReceipt {
                    action,
                    cost,
                    remaining: profile.credits,
                    entry,
                })
            }
            Ok(SpendOutcome::InsufficientFunds { current }) => {
                let error = CreditGateError::InsufficientCredits {
                    required: cost,
                    current,
                };
                self.state_tx.send_replace(GateState::Failed {
                    action,
                    reason: error.to_string(),
                });
                Err(error)
            }
            Err(store_error) => {
                self.state_tx.send_replace(GateState::Failed {
                    action,
                    reason: store_error.to_string(),
                });
                Err(store_error.into())
            }
        }
    }
}
