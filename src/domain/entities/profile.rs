//! User profile - durable credit balance and subscription tier

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{Plan, UserId};

/// Credits granted to every new profile
pub const DEFAULT_STARTING_CREDITS: u32 = 100;

/// Per-user billing record
///
/// Created on the first authenticated session and never deleted by this
/// service. The balance is unsigned by construction; the persistence layer
/// enforces the same floor with conditional updates.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub credits: u32,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Profile for a user seen for the first time
    pub fn new_default(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            credits: DEFAULT_STARTING_CREDITS,
            plan: Plan::Free,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this profile's tier allows one more project
    #[allow(dead_code)] // Kept for project creation once project CRUD lands
    pub fn can_create_project(&self, existing_projects: u32) -> bool {
        match self.plan.project_limit() {
            Some(limit) => existing_projects < limit,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_defaults() {
        let profile = UserProfile::new_default(UserId::new());
        assert_eq!(profile.credits, DEFAULT_STARTING_CREDITS);
        assert_eq!(profile.plan, Plan::Free);
    }

    #[test]
    fn test_free_plan_project_ceiling() {
        let profile = UserProfile::new_default(UserId::new());
        assert!(profile.can_create_project(0));
        assert!(profile.can_create_project(2));
        assert!(!profile.can_create_project(3));
        assert!(!profile.can_create_project(10));
    }

    #[test]
    fn test_pro_plan_is_unbounded() {
        let mut profile = UserProfile::new_default(UserId::new());
        profile.plan = Plan::Pro;
        assert!(profile.can_create_project(1_000));
    }
}
