use async_trait::async_trait;

use crate::{
    database::{
        queries::{DefinitionQueries, OverrideQueries},
        Database,
    },
    errors::{AppError, Result},
    models::{DefinitionUpdate, EntityQuotaOverride, EntityRef, ResourceQuotaDefinition},
    storage::QuotaStore,
};

pub struct PgQuotaStore {
    database: Database,
}

impl PgQuotaStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

fn foreign_key_violation(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation()
    )
}

#[async_trait]
impl QuotaStore for PgQuotaStore {
    async fn list_definitions(&self) -> Result<Vec<ResourceQuotaDefinition>> {
        DefinitionQueries::list(self.database.pool())
            .await?
            .into_iter()
            .map(ResourceQuotaDefinition::try_from)
            .collect()
    }

    async fn find_definition(&self, codename: &str) -> Result<Option<ResourceQuotaDefinition>> {
        DefinitionQueries::find_by_codename(self.database.pool(), codename)
            .await?
            .map(ResourceQuotaDefinition::try_from)
            .transpose()
    }

    async fn insert_definition(&self, definition: &ResourceQuotaDefinition) -> Result<bool> {
        DefinitionQueries::insert_if_missing(self.database.pool(), definition).await
    }

    async fn update_definition(
        &self,
        codename: &str,
        update: &DefinitionUpdate,
    ) -> Result<Option<ResourceQuotaDefinition>> {
        DefinitionQueries::update(self.database.pool(), codename, update)
            .await?
            .map(ResourceQuotaDefinition::try_from)
            .transpose()
    }

    async fn retain_definitions(&self, keep: &[String]) -> Result<Vec<String>> {
        DefinitionQueries::delete_except(self.database.pool(), keep).await
    }

    async fn find_override(
        &self,
        codename: &str,
        entity: &EntityRef,
    ) -> Result<Option<EntityQuotaOverride>> {
        OverrideQueries::find(self.database.pool(), codename, entity.kind.as_str(), entity.id)
            .await?
            .map(EntityQuotaOverride::try_from)
            .transpose()
    }

    async fn ensure_override(
        &self,
        codename: &str,
        entity: &EntityRef,
    ) -> Result<EntityQuotaOverride> {
        let pool = self.database.pool();
        let kind = entity.kind.as_str();

        match OverrideQueries::insert_empty(pool, codename, kind, entity.id).await {
            Ok(true) => {
                tracing::debug!(codename, entity = %entity, "Created empty quota override");
            }
            Ok(false) => {}
            Err(e) if foreign_key_violation(&e) => {
                return Err(AppError::Configuration(format!(
                    "no quota definition named '{}'",
                    codename
                )));
            }
            Err(e) => return Err(e),
        }

        OverrideQueries::find(pool, codename, kind, entity.id)
            .await?
            .map(EntityQuotaOverride::try_from)
            .transpose()?
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "override for {} on '{}' vanished after creation",
                    entity, codename
                ))
            })
    }

    async fn set_override(
        &self,
        codename: &str,
        entity: &EntityRef,
        value: Option<f64>,
    ) -> Result<EntityQuotaOverride> {
        let row = OverrideQueries::upsert_value(
            self.database.pool(),
            codename,
            entity.kind.as_str(),
            entity.id,
            value,
        )
        .await
        .map_err(|e| {
            if foreign_key_violation(&e) {
                AppError::Configuration(format!("no quota definition named '{}'", codename))
            } else {
                e
            }
        })?;

        EntityQuotaOverride::try_from(row)
    }

    async fn delete_override(&self, codename: &str, entity: &EntityRef) -> Result<bool> {
        OverrideQueries::delete(self.database.pool(), codename, entity.kind.as_str(), entity.id)
            .await
    }

    async fn list_overrides(&self, codename: &str) -> Result<Vec<EntityQuotaOverride>> {
        OverrideQueries::list_for_definition(self.database.pool(), codename)
            .await?
            .into_iter()
            .map(EntityQuotaOverride::try_from)
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        self.database.ping().await
    }
}
