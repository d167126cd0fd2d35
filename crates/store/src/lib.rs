//! Database and auth collaborators for payassist.
//!
//! Both implement `payassist_core::DataStore` and `payassist_core::AuthProvider`:
//! - [`SupabaseClient`]: PostgREST rows and GoTrue auth over HTTPS
//! - [`InMemoryStore`]: tables of JSON rows, for tests and local demos

pub mod in_memory;
pub mod supabase;

use std::sync::Arc;

use payassist_core::error::StoreError;
use payassist_core::store::{AuthProvider, DataStore};

pub use in_memory::InMemoryStore;
pub use supabase::SupabaseClient;

/// The pair of collaborators the gateway needs.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn DataStore>,
    pub auth: Arc<dyn AuthProvider>,
}

/// Build the store from configuration.
///
/// Falls back to an empty in-memory store when no database is configured.
pub fn build_from_config(config: &payassist_config::AppConfig) -> Result<Backends, StoreError> {
    let db = &config.database;
    match (&db.url, db.anon_key.as_ref().or(db.service_key.as_ref())) {
        (Some(url), Some(anon)) => {
            let client = Arc::new(SupabaseClient::new(
                url.clone(),
                anon.clone(),
                db.service_key.clone(),
            )?);
            tracing::info!(url = %url, "Using Supabase store");
            Ok(Backends {
                store: client.clone(),
                auth: client,
            })
        }
        _ => {
            tracing::warn!("No database configured; using an empty in-memory store");
            let memory = Arc::new(InMemoryStore::new());
            Ok(Backends {
                store: memory.clone(),
                auth: memory,
            })
        }
    }
}
