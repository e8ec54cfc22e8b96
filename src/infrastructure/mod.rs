//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - Persistence: Supabase PostgREST adapters for profiles, ledger and artifacts
//! - Session: GoTrue-backed ambient identity
//! - Generation: Edge Function generation endpoint
//! - HTTP: REST API routes
//! - Config: Application configuration
//! - State: Shared application state

pub mod config;
pub mod generation;
pub mod http;
pub mod persistence;
pub mod session;
pub mod state;
