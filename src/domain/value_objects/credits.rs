//! Credit actions and the pricing policy for AI generation features

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::value_objects::{ProjectId, RequestId};

/// A billable generation action
///
/// The set of actions is closed: every credit-consuming feature is a variant
/// here, and the cost table below is exhaustive. String forms exist only at
/// the HTTP and persistence boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditAction {
    /// Generate a story treatment for a project
    StoryGeneration,
    /// Break a scene down into a shot list
    ShotListGeneration,
    /// Generate a full photoboard for a shot list
    PhotoboardGeneration,
    /// Generate a single photoboard frame
    PhotoboardFrame,
    /// Regenerate an existing photoboard frame
    PhotoboardRegeneration,
}

impl CreditAction {
    /// All actions, in pricing-table order
    pub const ALL: [CreditAction; 5] = [
        CreditAction::StoryGeneration,
        CreditAction::ShotListGeneration,
        CreditAction::PhotoboardGeneration,
        CreditAction::PhotoboardFrame,
        CreditAction::PhotoboardRegeneration,
    ];

    /// Credit cost of this action. Every action costs at least one credit.
    pub fn cost(&self) -> u32 {
        match self {
            CreditAction::StoryGeneration => 10,
            CreditAction::ShotListGeneration => 5,
            CreditAction::PhotoboardGeneration => 10,
            CreditAction::PhotoboardFrame => 2,
            CreditAction::PhotoboardRegeneration => 2,
        }
    }

    /// Stable string form used in ledger rows and URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditAction::StoryGeneration => "story_generation",
            CreditAction::ShotListGeneration => "shot_list_generation",
            CreditAction::PhotoboardGeneration => "photoboard_generation",
            CreditAction::PhotoboardFrame => "photoboard_frame",
            CreditAction::PhotoboardRegeneration => "photoboard_regeneration",
        }
    }
}

impl std::fmt::Display for CreditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CreditAction {
    type Err = UnknownCreditAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story_generation" => Ok(CreditAction::StoryGeneration),
            "shot_list_generation" => Ok(CreditAction::ShotListGeneration),
            "photoboard_generation" => Ok(CreditAction::PhotoboardGeneration),
            "photoboard_frame" => Ok(CreditAction::PhotoboardFrame),
            "photoboard_regeneration" => Ok(CreditAction::PhotoboardRegeneration),
            other => Err(UnknownCreditAction(other.to_string())),
        }
    }
}

/// Raised when a boundary string names no known action
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown credit action: {0}")]
pub struct UnknownCreditAction(pub String);

/// Whether a balance covers a cost. Equality is sufficient.
pub fn covers(balance: u32, cost: u32) -> bool {
    balance >= cost
}

/// Whether a balance covers the cost of an action
pub fn is_sufficient(balance: u32, action: CreditAction) -> bool {
    covers(balance, action.cost())
}

/// Where a spend came from, recorded alongside the ledger entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpendContext {
    pub project_id: Option<ProjectId>,
    pub request_id: Option<RequestId>,
}

impl SpendContext {
    pub fn for_project(project_id: ProjectId, request_id: RequestId) -> Self {
        Self {
            project_id: Some(project_id),
            request_id: Some(request_id),
        }
    }
}
