//! Subscription plans and billing events

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Subscription tier for a user profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    /// Maximum number of projects this tier allows. `None` means unlimited.
    pub fn project_limit(&self) -> Option<u32> {
        match self {
            Plan::Free => Some(3),
            Plan::Pro => None,
            Plan::Enterprise => None,
        }
    }

    /// The tier to suggest when this one runs out of credits
    pub fn next_tier(&self) -> Option<Plan> {
        match self {
            Plan::Free => Some(Plan::Pro),
            Plan::Pro => Some(Plan::Enterprise),
            Plan::Enterprise => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

/// Raised when a stored plan string names no known tier
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown plan: {0}")]
pub struct UnknownPlan(pub String);

/// A confirmed billing effect to apply to a profile
///
/// Payment confirmation happens outside this service; by the time an event
/// arrives here the money side is settled. Applying it can raise the credit
/// balance, change the plan, or both.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanEvent {
    /// New plan to move the profile to, if the tier changed
    pub plan: Option<Plan>,
    /// Credits to add to the balance
    #[serde(default)]
    pub credit_grant: u32,
}
