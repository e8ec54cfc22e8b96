//! Supabase persistence adapters
//!
//! PostgREST-backed stores for user profiles, the credit ledger and
//! generated artifacts, sharing one HTTP client and key set.

mod artifact_repository;
mod profile_repository;
mod supabase;

pub use artifact_repository::SupabaseArtifactRepository;
pub use profile_repository::SupabaseProfileRepository;
pub use supabase::{SupabaseClient, SupabaseError};
