//! Credit ledger - audit trail for every successful deduction

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{
    CreditAction, LedgerEntryId, ProjectId, RequestId, SpendContext, UserId,
};

/// One row of the spend audit trail
///
/// Written after the balance decrement commits. The balance row stays
/// authoritative; the ledger is for audit and support, so a failed ledger
/// write degrades to a warning rather than rolling back the spend.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditLedgerEntry {
    pub id: LedgerEntryId,
    pub user_id: UserId,
    pub action: CreditAction,
    pub cost: u32,
    pub balance_after: u32,
    pub project_id: Option<ProjectId>,
    pub request_id: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

impl CreditLedgerEntry {
    pub fn record(
        user_id: UserId,
        action: CreditAction,
        cost: u32,
        balance_after: u32,
        context: &SpendContext,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            user_id,
            action,
            cost,
            balance_after,
            project_id: context.project_id,
            request_id: context.request_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_carries_context() {
        let project_id = ProjectId::new();
        let request_id = RequestId::new();
        let context = SpendContext::for_project(project_id, request_id);

        let entry = CreditLedgerEntry::record(
            UserId::new(),
            CreditAction::ShotListGeneration,
            5,
            95,
            &context,
        );

        assert_eq!(entry.cost, 5);
        assert_eq!(entry.balance_after, 95);
        assert_eq!(entry.project_id, Some(project_id));
        assert_eq!(entry.request_id, Some(request_id));
    }
}
