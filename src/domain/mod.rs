//! Domain layer - Core business logic with no external dependencies
//!
//! This layer contains:
//! - Entities: UserProfile, GeneratedArtifact, CreditLedgerEntry
//! - Value Objects: CreditAction pricing, Plan tiers, typed identifiers

pub mod entities;
pub mod value_objects;
