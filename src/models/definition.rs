use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::calculators::CalculatorSpec;
use crate::errors::AppError;
use crate::models::EntityKind;

/// Quota policy for one resource kind applied to one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResourceQuotaDefinition {
    pub codename: String,
    pub name: String,
    pub description: String,
    pub help: String,
    pub default_quota: f64,
    pub units: String,
    pub applies_to: EntityKind,
    pub active: bool,
    pub impose_default: bool,
    pub handler_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceQuotaDefinition {
    /// Codename of the definition a calculator gets for `kind`.
    pub fn codename_for(kind: EntityKind, calculator_codename: &str) -> String {
        format!("{}_{}", kind, calculator_codename)
    }

    /// A fresh definition seeded from calculator metadata, enforcing and
    /// imposing its default.
    pub fn from_spec(spec: &CalculatorSpec, kind: EntityKind) -> Self {
        let now = Utc::now();
        Self {
            codename: Self::codename_for(kind, &spec.codename),
            name: spec.name.clone(),
            description: spec.description.clone(),
            help: spec.help.clone(),
            default_quota: spec.default,
            units: spec.units.clone(),
            applies_to: kind,
            active: true,
            impose_default: true,
            handler_ref: spec.codename.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: &DefinitionUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(help) = &update.help {
            self.help = help.clone();
        }
        if let Some(default_quota) = update.default_quota {
            self.default_quota = default_quota;
        }
        if let Some(units) = &update.units {
            self.units = units.clone();
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(impose_default) = update.impose_default {
            self.impose_default = impose_default;
        }
        self.updated_at = Utc::now();
    }
}

/// Raw `resource_quota_definitions` row; `applies_to` is validated on conversion.
#[derive(Debug, Clone, FromRow)]
pub struct DefinitionRow {
    pub codename: String,
    pub name: String,
    pub description: String,
    pub help: String,
    pub default_quota: f64,
    pub units: String,
    pub applies_to: String,
    pub active: bool,
    pub impose_default: bool,
    pub handler_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DefinitionRow> for ResourceQuotaDefinition {
    type Error = AppError;

    fn try_from(row: DefinitionRow) -> Result<Self, Self::Error> {
        let applies_to = row.applies_to.parse::<EntityKind>().map_err(|e| {
            AppError::Configuration(format!("definition {}: {}", row.codename, e))
        })?;

        Ok(Self {
            codename: row.codename,
            name: row.name,
            description: row.description,
            help: row.help,
            default_quota: row.default_quota,
            units: row.units,
            applies_to,
            active: row.active,
            impose_default: row.impose_default,
            handler_ref: row.handler_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Administrator edits to a definition's policy fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DefinitionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub help: Option<String>,
    pub default_quota: Option<f64>,
    pub units: Option<String>,
    pub active: Option<bool>,
    pub impose_default: Option<bool>,
}

impl DefinitionUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(default_quota) = self.default_quota {
            if !default_quota.is_finite() || default_quota < 0.0 {
                return Err(AppError::Validation(
                    "default_quota must be a non-negative number".to_string(),
                ));
            }
        }
        if matches!(&self.units, Some(units) if units.trim().is_empty()) {
            return Err(AppError::Validation("units cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(applies_to: &str) -> DefinitionRow {
        DefinitionRow {
            codename: "user_workspace_quota".to_string(),
            name: "Workspace".to_string(),
            description: String::new(),
            help: String::new(),
            default_quota: 1.0,
            units: "GB".to_string(),
            applies_to: applies_to.to_string(),
            active: true,
            impose_default: true,
            handler_ref: "workspace_quota".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_with_unknown_kind_is_configuration_error() {
        let result = ResourceQuotaDefinition::try_from(row("group"));
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert!(ResourceQuotaDefinition::try_from(row("user")).is_ok());
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let mut definition = ResourceQuotaDefinition::try_from(row("user")).unwrap();
        definition.apply(&DefinitionUpdate {
            impose_default: Some(false),
            default_quota: Some(5.0),
            ..Default::default()
        });
        assert!(!definition.impose_default);
        assert_eq!(definition.default_quota, 5.0);
        assert!(definition.active);
        assert_eq!(definition.units, "GB");
    }

    #[test]
    fn test_update_validation() {
        let negative = DefinitionUpdate {
            default_quota: Some(-1.0),
            ..Default::default()
        };
        assert!(negative.validate().is_err());
        assert!(DefinitionUpdate::default().validate().is_ok());
    }
}
