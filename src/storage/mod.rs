//! Persistence of quota definitions and per-entity overrides.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::errors::{AppError, Result};
use crate::models::{DefinitionUpdate, EntityQuotaOverride, EntityRef, ResourceQuotaDefinition};

pub mod memory;
pub mod postgres;

pub use memory::MemoryQuotaStore;
pub use postgres::PgQuotaStore;

#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn list_definitions(&self) -> Result<Vec<ResourceQuotaDefinition>>;

    async fn find_definition(&self, codename: &str) -> Result<Option<ResourceQuotaDefinition>>;

    /// Insert a definition unless one with the same codename exists.
    /// Returns whether a row was created.
    async fn insert_definition(&self, definition: &ResourceQuotaDefinition) -> Result<bool>;

    async fn update_definition(
        &self,
        codename: &str,
        update: &DefinitionUpdate,
    ) -> Result<Option<ResourceQuotaDefinition>>;

    /// Delete every definition whose codename is not in `keep`, along with
    /// its overrides. Returns the deleted codenames.
    async fn retain_definitions(&self, keep: &[String]) -> Result<Vec<String>>;

    async fn find_override(
        &self,
        codename: &str,
        entity: &EntityRef,
    ) -> Result<Option<EntityQuotaOverride>>;

    /// Create an empty override for the pair if none exists, then return the
    /// stored row. Concurrent callers all get the same row back.
    async fn ensure_override(&self, codename: &str, entity: &EntityRef)
        -> Result<EntityQuotaOverride>;

    async fn set_override(
        &self,
        codename: &str,
        entity: &EntityRef,
        value: Option<f64>,
    ) -> Result<EntityQuotaOverride>;

    async fn delete_override(&self, codename: &str, entity: &EntityRef) -> Result<bool>;

    async fn list_overrides(&self, codename: &str) -> Result<Vec<EntityQuotaOverride>>;

    async fn ping(&self) -> Result<()>;
}

pub async fn create_store(config: &Config) -> Result<Arc<dyn QuotaStore>> {
    match config.store_backend.as_str() {
        "memory" => Ok(Arc::new(MemoryQuotaStore::new())),
        "postgres" => {
            let database = Database::new(&config.database_url, config.database_max_connections).await?;
            database.migrate().await?;
            Ok(Arc::new(PgQuotaStore::new(database)))
        }
        other => Err(AppError::Configuration(format!(
            "Unsupported store backend: {}",
            other
        ))),
    }
}
