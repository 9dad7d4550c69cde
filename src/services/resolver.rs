use std::sync::Arc;

use crate::{
    errors::{AppError, Result},
    models::{Entity, ResolvedQuota, ResourceQuotaDefinition},
    storage::QuotaStore,
};

/// Computes the effective quota for an entity.
///
/// Precedence, first match wins:
/// 1. unknown codename: nothing resolved
/// 2. inactive definition: unlimited
/// 3. trusted principal: unlimited
/// 4. override with a value: that value
/// 5. `impose_default`: the definition default
/// 6. otherwise unlimited
///
/// An entity whose kind the definition does not govern is a configuration
/// error and is never resolved.
#[derive(Clone)]
pub struct QuotaResolver {
    store: Arc<dyn QuotaStore>,
}

impl QuotaResolver {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, entity: &Entity, codename: &str) -> Result<ResolvedQuota> {
        match self.store.find_definition(codename).await? {
            Some(definition) => self.resolve_definition(entity, &definition).await,
            None => {
                tracing::warn!(%codename, "Cannot resolve quota: no definition with this codename");
                Ok(ResolvedQuota::unresolved())
            }
        }
    }

    pub async fn resolve_definition(
        &self,
        entity: &Entity,
        definition: &ResourceQuotaDefinition,
    ) -> Result<ResolvedQuota> {
        let units = definition.units.as_str();

        // No override rows for entities of another kind.
        if definition.applies_to != entity.kind() {
            return Err(AppError::Configuration(format!(
                "quota {} applies to {} but was resolved for {}",
                definition.codename,
                definition.applies_to,
                entity.kind()
            )));
        }

        if !definition.active {
            return Ok(ResolvedQuota::unlimited(units));
        }

        if entity.is_trusted() {
            return Ok(ResolvedQuota::unlimited(units));
        }

        let reference = entity.reference();
        let quota_override = if definition.impose_default {
            // Keep an editable row around for administrators.
            Some(
                self.store
                    .ensure_override(&definition.codename, &reference)
                    .await?,
            )
        } else {
            self.store
                .find_override(&definition.codename, &reference)
                .await?
        };

        if let Some(value) = quota_override.as_ref().and_then(|row| row.effective_value()) {
            return Ok(ResolvedQuota::limited(value, units));
        }

        if definition.impose_default {
            Ok(ResolvedQuota::limited(definition.default_quota, units))
        } else {
            Ok(ResolvedQuota::unlimited(units))
        }
    }
}
