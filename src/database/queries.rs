use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{DefinitionRow, DefinitionUpdate, OverrideRow, ResourceQuotaDefinition};

const DEFINITION_COLUMNS: &str = "codename, name, description, help, default_quota, units, \
     applies_to, active, impose_default, handler_ref, created_at, updated_at";

const OVERRIDE_COLUMNS: &str = "codename, entity_kind, entity_id, value, created_at, updated_at";

pub struct DefinitionQueries;

impl DefinitionQueries {
    pub async fn list(pool: &PgPool) -> Result<Vec<DefinitionRow>> {
        let query = format!(
            "SELECT {DEFINITION_COLUMNS} FROM resource_quota_definitions ORDER BY codename"
        );
        let rows = sqlx::query_as::<_, DefinitionRow>(&query)
            .fetch_all(pool)
            .await?;

        Ok(rows)
    }

    pub async fn find_by_codename(pool: &PgPool, codename: &str) -> Result<Option<DefinitionRow>> {
        let query = format!(
            "SELECT {DEFINITION_COLUMNS} FROM resource_quota_definitions WHERE codename = $1"
        );
        let row = sqlx::query_as::<_, DefinitionRow>(&query)
            .bind(codename)
            .fetch_optional(pool)
            .await?;

        Ok(row)
    }

    pub async fn insert_if_missing(
        pool: &PgPool,
        definition: &ResourceQuotaDefinition,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO resource_quota_definitions
                (codename, name, description, help, default_quota, units,
                 applies_to, active, impose_default, handler_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (codename) DO NOTHING
            "#,
        )
        .bind(&definition.codename)
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(&definition.help)
        .bind(definition.default_quota)
        .bind(&definition.units)
        .bind(definition.applies_to.as_str())
        .bind(definition.active)
        .bind(definition.impose_default)
        .bind(&definition.handler_ref)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update(
        pool: &PgPool,
        codename: &str,
        update: &DefinitionUpdate,
    ) -> Result<Option<DefinitionRow>> {
        let query = format!(
            "UPDATE resource_quota_definitions SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                help = COALESCE($4, help), \
                default_quota = COALESCE($5, default_quota), \
                units = COALESCE($6, units), \
                active = COALESCE($7, active), \
                impose_default = COALESCE($8, impose_default), \
                updated_at = NOW() \
             WHERE codename = $1 \
             RETURNING {DEFINITION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DefinitionRow>(&query)
            .bind(codename)
            .bind(&update.name)
            .bind(&update.description)
            .bind(&update.help)
            .bind(update.default_quota)
            .bind(&update.units)
            .bind(update.active)
            .bind(update.impose_default)
            .fetch_optional(pool)
            .await?;

        Ok(row)
    }

    pub async fn delete_except(pool: &PgPool, keep: &[String]) -> Result<Vec<String>> {
        let deleted = sqlx::query_scalar::<_, String>(
            "DELETE FROM resource_quota_definitions \
             WHERE NOT (codename = ANY($1)) \
             RETURNING codename",
        )
        .bind(keep)
        .fetch_all(pool)
        .await?;

        Ok(deleted)
    }
}

pub struct OverrideQueries;

impl OverrideQueries {
    pub async fn find(
        pool: &PgPool,
        codename: &str,
        entity_kind: &str,
        entity_id: Uuid,
    ) -> Result<Option<OverrideRow>> {
        let query = format!(
            "SELECT {OVERRIDE_COLUMNS} FROM entity_quota_overrides \
             WHERE codename = $1 AND entity_kind = $2 AND entity_id = $3"
        );
        let row = sqlx::query_as::<_, OverrideRow>(&query)
            .bind(codename)
            .bind(entity_kind)
            .bind(entity_id)
            .fetch_optional(pool)
            .await?;

        Ok(row)
    }

    /// Insert an empty override; a concurrent insert of the same pair is ignored.
    pub async fn insert_empty(
        pool: &PgPool,
        codename: &str,
        entity_kind: &str,
        entity_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO entity_quota_overrides (codename, entity_kind, entity_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (codename, entity_kind, entity_id) DO NOTHING",
        )
        .bind(codename)
        .bind(entity_kind)
        .bind(entity_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn upsert_value(
        pool: &PgPool,
        codename: &str,
        entity_kind: &str,
        entity_id: Uuid,
        value: Option<f64>,
    ) -> Result<OverrideRow> {
        let query = format!(
            "INSERT INTO entity_quota_overrides (codename, entity_kind, entity_id, value) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (codename, entity_kind, entity_id) \
             DO UPDATE SET value = EXCLUDED.value, updated_at = NOW() \
             RETURNING {OVERRIDE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OverrideRow>(&query)
            .bind(codename)
            .bind(entity_kind)
            .bind(entity_id)
            .bind(value)
            .fetch_one(pool)
            .await?;

        Ok(row)
    }

    pub async fn delete(
        pool: &PgPool,
        codename: &str,
        entity_kind: &str,
        entity_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM entity_quota_overrides \
             WHERE codename = $1 AND entity_kind = $2 AND entity_id = $3",
        )
        .bind(codename)
        .bind(entity_kind)
        .bind(entity_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_definition(pool: &PgPool, codename: &str) -> Result<Vec<OverrideRow>> {
        let query = format!(
            "SELECT {OVERRIDE_COLUMNS} FROM entity_quota_overrides \
             WHERE codename = $1 ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, OverrideRow>(&query)
            .bind(codename)
            .fetch_all(pool)
            .await?;

        Ok(rows)
    }
}
