use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::EntityRef;

/// Per-entity override of a definition's default quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntityQuotaOverride {
    pub codename: String,
    pub entity: EntityRef,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityQuotaOverride {
    pub fn new(codename: &str, entity: EntityRef, value: Option<f64>) -> Self {
        let now = Utc::now();
        Self {
            codename: codename.to_string(),
            entity,
            value,
            created_at: now,
            updated_at: now,
        }
    }

    /// The override value, if one is set. Zero counts as unset.
    pub fn effective_value(&self) -> Option<f64> {
        self.value.filter(|value| *value != 0.0)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OverrideRow {
    pub codename: String,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OverrideRow> for EntityQuotaOverride {
    type Error = AppError;

    fn try_from(row: OverrideRow) -> Result<Self, Self::Error> {
        let kind = row.entity_kind.parse().map_err(|e| {
            AppError::Configuration(format!("override on {}: {}", row.codename, e))
        })?;

        Ok(Self {
            codename: row.codename,
            entity: EntityRef {
                kind,
                id: row.entity_id,
            },
            value: row.value,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetOverrideRequest {
    pub value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    #[test]
    fn test_zero_and_null_values_are_unset() {
        let entity = EntityRef {
            kind: EntityKind::User,
            id: Uuid::new_v4(),
        };
        assert_eq!(EntityQuotaOverride::new("c", entity, None).effective_value(), None);
        assert_eq!(EntityQuotaOverride::new("c", entity, Some(0.0)).effective_value(), None);
        assert_eq!(
            EntityQuotaOverride::new("c", entity, Some(2.0)).effective_value(),
            Some(2.0)
        );
    }
}
