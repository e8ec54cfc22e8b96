//! Domain entities - Core business objects with identity

mod artifact;
mod ledger;
mod profile;

pub use artifact::{
    ArtifactParseError, ArtifactRecord, GeneratedArtifact, Photoboard, PhotoboardFrame, Shot,
    ShotList, Story, StoryScene,
};
pub use ledger::CreditLedgerEntry;
pub use profile::{UserProfile, DEFAULT_STARTING_CREDITS};
