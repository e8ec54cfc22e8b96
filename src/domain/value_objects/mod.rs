//! Value objects - Immutable objects defined by their attributes

mod credits;
mod ids;
mod plan;

pub use credits::{covers, is_sufficient, CreditAction, SpendContext, UnknownCreditAction};
pub use ids::*;
pub use plan::{Plan, PlanEvent, UnknownPlan};
