//! # payassist core
//!
//! Domain types, collaborator traits, and error definitions for the payroll
//! assistant backend. This crate has **zero framework dependencies**: it
//! defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Both external services are traits here:
//! - [`Provider`]: the hosted LLM (single-shot and streaming generation)
//! - [`DataStore`] / [`AuthProvider`]: the managed database and its auth API
//!
//! Implementations live in `payassist-providers` and `payassist-store`, so the
//! pipeline can be exercised against scripted mocks in tests.

pub mod context;
pub mod error;
pub mod identity;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use context::{Context, HistoryEntry, Intent, MAX_HISTORY_ENTRIES};
pub use error::{AuthError, Error, ProviderError, Result, StoreError};
pub use identity::Identity;
pub use provider::{GenerationConfig, GenerationRequest, GenerationResponse, Provider};
pub use store::{AuthProvider, AuthSession, AuthUser, DataStore, Filter, Query, Row};
