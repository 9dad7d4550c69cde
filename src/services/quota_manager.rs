use std::sync::Arc;

use crate::{
    calculators::CalculatorRegistry,
    errors::{AppError, Result},
    models::{Availability, Entity, RequestContext, ResourceQuotaDefinition, UsageSummary},
    services::{
        metrics::{AdmissionOutcome, MetricsService},
        resolver::QuotaResolver,
    },
    storage::QuotaStore,
    utils::{format_storage, to_bytes, FileCandidate},
};

/// Admission decisions: headroom, pass/fail checks, the request guard and
/// file admission.
pub struct QuotaManager {
    store: Arc<dyn QuotaStore>,
    registry: Arc<CalculatorRegistry>,
    resolver: QuotaResolver,
    metrics: Arc<MetricsService>,
    optional_codenames: Vec<String>,
}

impl QuotaManager {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        registry: Arc<CalculatorRegistry>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            resolver: QuotaResolver::new(store.clone()),
            store,
            registry,
            metrics,
            optional_codenames: Vec::new(),
        }
    }

    /// Codenames that may legitimately have no definition (their handler is
    /// not installed everywhere). Lookups of these log at info, not warn.
    pub fn with_optional_codenames(mut self, codenames: Vec<String>) -> Self {
        self.optional_codenames = codenames;
        self
    }

    pub fn resolver(&self) -> &QuotaResolver {
        &self.resolver
    }

    async fn definition(&self, codename: &str) -> Result<Option<ResourceQuotaDefinition>> {
        let definition = self.store.find_definition(codename).await?;
        if definition.is_none() {
            if self.optional_codenames.iter().any(|optional| optional == codename) {
                tracing::info!(%codename, "Optional quota codename has no definition");
            } else {
                tracing::warn!(%codename, "Invalid quota codename");
            }
        }
        Ok(definition)
    }

    async fn current_use(
        &self,
        entity: &Entity,
        definition: &ResourceQuotaDefinition,
    ) -> Result<f64> {
        let calculator = self.registry.get(&definition.handler_ref).ok_or_else(|| {
            AppError::Configuration(format!(
                "definition {} refers to unregistered usage calculator '{}'",
                definition.codename, definition.handler_ref
            ))
        })?;

        let current_use = calculator.current_use(entity).await?;
        tracing::debug!(
            codename = %definition.codename,
            entity = %entity.reference(),
            current_use,
            "Measured resource usage"
        );
        Ok(current_use)
    }

    async fn available_for(
        &self,
        entity: &Entity,
        definition: &ResourceQuotaDefinition,
    ) -> Result<Option<Availability>> {
        // Unlimited quotas never need a (possibly slow) usage measurement.
        let Some(quota) = self.resolver.resolve_definition(entity, definition).await?.quota else {
            return Ok(None);
        };

        let current_use = self.current_use(entity, definition).await?;
        Ok(Some(Availability {
            available: (quota - current_use).max(0.0),
            units: definition.units.clone(),
        }))
    }

    /// Remaining headroom for `entity`, or `None` when the codename is unknown
    /// or the entity is not limited.
    pub async fn get_resource_available(
        &self,
        entity: &Entity,
        codename: &str,
    ) -> Result<Option<Availability>> {
        match self.definition(codename).await? {
            Some(definition) => self.available_for(entity, &definition).await,
            None => Ok(None),
        }
    }

    /// Whether `entity` still has headroom under `codename`.
    ///
    /// Unknown codenames and misconfigured definitions pass. A failed check
    /// becomes [`AppError::QuotaExceeded`] when `raise_on_false` is set.
    pub async fn passes_quota(
        &self,
        entity: &Entity,
        codename: &str,
        raise_on_false: bool,
    ) -> Result<bool> {
        match self.definition(codename).await? {
            Some(definition) => self.check(entity, &definition, raise_on_false).await,
            None => {
                self.metrics.record_admission(codename, AdmissionOutcome::FailOpen);
                Ok(true)
            }
        }
    }

    async fn check(
        &self,
        entity: &Entity,
        definition: &ResourceQuotaDefinition,
        raise_on_false: bool,
    ) -> Result<bool> {
        let codename = definition.codename.as_str();

        let passes = match self.available_for(entity, definition).await {
            Ok(None) => true,
            Ok(Some(availability)) => availability.available > 0.0,
            Err(AppError::Configuration(reason)) => {
                tracing::warn!(%codename, %reason, "Quota misconfigured, allowing operation");
                self.metrics.record_admission(codename, AdmissionOutcome::FailOpen);
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        if passes {
            self.metrics.record_admission(codename, AdmissionOutcome::Allowed);
            return Ok(true);
        }

        self.metrics.record_admission(codename, AdmissionOutcome::Denied);
        tracing::info!(%codename, entity = %entity.reference(), "Quota exceeded");

        if raise_on_false {
            return Err(AppError::QuotaExceeded {
                codename: codename.to_string(),
                help: definition.help.clone(),
            });
        }
        Ok(false)
    }

    /// Protect an operation with `codename`, picking the acting entity from
    /// `ctx` according to what the definition applies to.
    ///
    /// Only an exceeded quota blocks. Every other problem is logged and the
    /// operation goes ahead.
    pub async fn guard(&self, ctx: &RequestContext, codename: &str) -> Result<()> {
        let definition = match self.definition(codename).await {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                self.metrics.record_admission(codename, AdmissionOutcome::FailOpen);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(%codename, error = %e, "Could not load quota definition, allowing operation");
                self.metrics.record_admission(codename, AdmissionOutcome::FailOpen);
                return Ok(());
            }
        };

        let Some(entity) = ctx.entity(definition.applies_to) else {
            tracing::warn!(
                %codename,
                applies_to = %definition.applies_to,
                "No acting entity of the governed kind, allowing operation"
            );
            self.metrics.record_admission(codename, AdmissionOutcome::FailOpen);
            return Ok(());
        };

        match self.check(entity, &definition, true).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_quota_exceeded() => Err(e),
            Err(e) => {
                tracing::warn!(%codename, error = %e, "Quota check failed, allowing operation");
                self.metrics.record_admission(codename, AdmissionOutcome::FailOpen);
                Ok(())
            }
        }
    }

    /// Whether `file` fits in what `entity` has left under `codename`.
    ///
    /// Checking an entity of the wrong kind is a caller error. Sizes are
    /// compared in the definition's units when they are convertible.
    pub async fn can_add_file(
        &self,
        entity: &Entity,
        codename: &str,
        file: impl Into<FileCandidate>,
    ) -> Result<bool> {
        let Some(definition) = self.definition(codename).await? else {
            return Ok(true);
        };

        if definition.applies_to != entity.kind() {
            return Err(AppError::Configuration(format!(
                "quota {} applies to {} but was checked for {}",
                codename,
                definition.applies_to,
                entity.kind()
            )));
        }

        let availability = match self.available_for(entity, &definition).await {
            Ok(Some(availability)) => availability,
            Ok(None) => return Ok(true),
            Err(AppError::Configuration(reason)) => {
                tracing::warn!(%codename, %reason, "Quota misconfigured, allowing file");
                self.metrics.record_admission(codename, AdmissionOutcome::FailOpen);
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        if availability.available <= 0.0 {
            self.metrics.record_admission(codename, AdmissionOutcome::Denied);
            return Ok(false);
        }

        let size = file.into().size().await?;
        let allowed = match to_bytes(&definition.units, 1.0) {
            Some(unit_bytes) => size as f64 / unit_bytes as f64 <= availability.available,
            None => {
                tracing::debug!(
                    %codename,
                    units = %definition.units,
                    "Quota units are not convertible from bytes, admitting on remaining headroom"
                );
                true
            }
        };

        let outcome = if allowed {
            AdmissionOutcome::Allowed
        } else {
            AdmissionOutcome::Denied
        };
        self.metrics.record_admission(codename, outcome);
        Ok(allowed)
    }

    /// Usage figures for administrators, e.g. `"409 MB of 1 GB used"`.
    pub async fn usage_summary(
        &self,
        entity: &Entity,
        codename: &str,
    ) -> Result<Option<UsageSummary>> {
        let Some(definition) = self.definition(codename).await? else {
            return Ok(None);
        };

        let resolved = self.resolver.resolve_definition(entity, &definition).await?;
        let used = self.current_use(entity, &definition).await?;
        let units = definition.units.as_str();

        let used_display = render_amount(units, used);
        let quota_display = match resolved.quota {
            Some(quota) => render_amount(units, quota),
            None => "unlimited".to_string(),
        };

        Ok(Some(UsageSummary {
            codename: definition.codename.clone(),
            used,
            quota: resolved.quota,
            available: resolved.quota.map(|quota| (quota - used).max(0.0)),
            units: definition.units.clone(),
            display: format!("{} of {} used", used_display, quota_display),
        }))
    }
}

fn render_amount(units: &str, amount: f64) -> String {
    format_storage(units, amount).unwrap_or_else(|| format!("{} {}", amount, units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{
        test_spec, CalculatorSpec, FixedUsageCalculator, MockUsageCalculator, UsageCalculator,
    };
    use crate::models::{DefinitionUpdate, EntityKind};
    use crate::services::sync::QuotaSync;
    use crate::storage::MemoryQuotaStore;
    use uuid::Uuid;

    const WORKSPACE: &str = "user_workspace_quota";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    struct Harness {
        manager: QuotaManager,
        store: Arc<MemoryQuotaStore>,
        metrics: Arc<MetricsService>,
    }

    async fn harness(calculators: Vec<Arc<dyn UsageCalculator>>) -> Harness {
        let mut registry = CalculatorRegistry::new();
        for calculator in calculators {
            registry.register(calculator).unwrap();
        }
        let registry = Arc::new(registry);
        let store = Arc::new(MemoryQuotaStore::new());
        let metrics = Arc::new(MetricsService::new().unwrap());

        QuotaSync::new(store.clone(), registry.clone(), metrics.clone())
            .sync_registered()
            .await
            .unwrap();

        Harness {
            manager: QuotaManager::new(store.clone(), registry, metrics.clone()),
            store,
            metrics,
        }
    }

    fn shared(calculator: impl UsageCalculator + 'static) -> Arc<dyn UsageCalculator> {
        Arc::new(calculator)
    }

    fn workspace(current_use: f64) -> Arc<dyn UsageCalculator> {
        shared(FixedUsageCalculator::new(
            test_spec("workspace_quota", vec![EntityKind::User]),
            current_use,
        ))
    }

    fn mock_calculator(spec: CalculatorSpec) -> MockUsageCalculator {
        let mut mock = MockUsageCalculator::new();
        mock.expect_spec().return_const(spec);
        mock
    }

    #[tokio::test]
    async fn test_end_to_end_workspace_scenario() {
        let h = harness(vec![workspace(0.4)]).await;
        let user = Entity::user(Uuid::new_v4());

        let availability = h
            .manager
            .get_resource_available(&user, WORKSPACE)
            .await
            .unwrap()
            .unwrap();
        assert!(close(availability.available, 0.6));
        assert_eq!(availability.units, "GB");

        h.store
            .set_override(WORKSPACE, &user.reference(), Some(2.0))
            .await
            .unwrap();

        let availability = h
            .manager
            .get_resource_available(&user, WORKSPACE)
            .await
            .unwrap()
            .unwrap();
        assert!(close(availability.available, 1.6));
    }

    #[tokio::test]
    async fn test_available_never_negative() {
        let h = harness(vec![workspace(7.5)]).await;
        let user = Entity::user(Uuid::new_v4());

        let availability = h
            .manager
            .get_resource_available(&user, WORKSPACE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(availability.available, 0.0);
        assert!(!h.manager.passes_quota(&user, WORKSPACE, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlimited_entities_have_no_bounded_availability() {
        let mut mock = mock_calculator(test_spec("workspace_quota", vec![EntityKind::User]));
        mock.expect_current_use().never();
        let h = harness(vec![shared(mock)]).await;

        let staff = Entity::staff(Uuid::new_v4());
        assert!(h
            .manager
            .get_resource_available(&staff, WORKSPACE)
            .await
            .unwrap()
            .is_none());
        assert!(h.manager.passes_quota(&staff, WORKSPACE, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_codename_fails_open() {
        let h = harness(vec![workspace(100.0)]).await;
        let user = Entity::user(Uuid::new_v4());

        assert!(h
            .manager
            .get_resource_available(&user, "user_missing")
            .await
            .unwrap()
            .is_none());
        assert!(h.manager.passes_quota(&user, "user_missing", true).await.unwrap());
        assert_eq!(
            h.metrics.admission_count("user_missing", AdmissionOutcome::FailOpen),
            1
        );
    }

    #[tokio::test]
    async fn test_exceeded_quota_raises_with_help_text() {
        let h = harness(vec![workspace(1.0)]).await;
        let user = Entity::user(Uuid::new_v4());

        assert!(!h.manager.passes_quota(&user, WORKSPACE, false).await.unwrap());

        let err = h
            .manager
            .passes_quota(&user, WORKSPACE, true)
            .await
            .unwrap_err();
        match err {
            AppError::QuotaExceeded { codename, help } => {
                assert_eq!(codename, WORKSPACE);
                assert_eq!(help, "workspace_quota exceeded, free some space");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.metrics.admission_count(WORKSPACE, AdmissionOutcome::Denied), 2);
    }

    #[tokio::test]
    async fn test_calculator_measured_once_per_decision() {
        let mut mock = mock_calculator(test_spec("workspace_quota", vec![EntityKind::User]));
        mock.expect_current_use().times(1).returning(|_| Ok(0.5));
        let h = harness(vec![shared(mock)]).await;

        let user = Entity::user(Uuid::new_v4());
        assert!(h.manager.passes_quota(&user, WORKSPACE, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_guard_picks_entity_by_definition_kind() {
        let h = harness(vec![shared(FixedUsageCalculator::new(
            test_spec("api_calls", vec![EntityKind::App]),
            1.0,
        ))])
        .await;
        let app = Entity::app(Uuid::new_v4());
        let user = Entity::user(Uuid::new_v4());

        // Only a user is acting: nothing to measure, fail open.
        let ctx = RequestContext::for_user(user.clone());
        assert!(h.manager.guard(&ctx, "app_api_calls").await.is_ok());

        let ctx = RequestContext {
            user: Some(user),
            app: Some(app),
        };
        let err = h.manager.guard(&ctx, "app_api_calls").await.unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn test_guard_fails_open_on_calculator_error() {
        let mut mock = mock_calculator(test_spec("workspace_quota", vec![EntityKind::User]));
        mock.expect_current_use()
            .returning(|_| Err(AppError::Calculator("disk unavailable".to_string())));
        let h = harness(vec![shared(mock)]).await;

        let ctx = RequestContext::for_user(Entity::user(Uuid::new_v4()));
        assert!(h.manager.guard(&ctx, WORKSPACE).await.is_ok());
        assert!(h.manager.guard(&ctx, "user_unknown").await.is_ok());
    }

    #[tokio::test]
    async fn test_passes_quota_fails_open_for_unregistered_calculator() {
        let h = harness(vec![workspace(0.0)]).await;
        // A manager wired without the calculator the definition points at.
        let manager = QuotaManager::new(
            h.store.clone(),
            Arc::new(CalculatorRegistry::new()),
            h.metrics.clone(),
        );

        let user = Entity::user(Uuid::new_v4());
        assert!(manager.passes_quota(&user, WORKSPACE, true).await.unwrap());
        assert!(matches!(
            manager.get_resource_available(&user, WORKSPACE).await,
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_can_add_file_fails_open_for_unregistered_calculator() {
        let h = harness(vec![workspace(0.0)]).await;
        let manager = QuotaManager::new(
            h.store.clone(),
            Arc::new(CalculatorRegistry::new()),
            h.metrics.clone(),
        );

        let user = Entity::user(Uuid::new_v4());
        assert!(manager.can_add_file(&user, WORKSPACE, 1024u64).await.unwrap());
        assert_eq!(h.metrics.admission_count(WORKSPACE, AdmissionOutcome::FailOpen), 1);
    }

    #[tokio::test]
    async fn test_other_entity_kind_is_never_measured_or_recorded() {
        let mut mock = mock_calculator(test_spec("workspace_quota", vec![EntityKind::User]));
        mock.expect_current_use().never();
        let h = harness(vec![shared(mock)]).await;
        let app = Entity::app(Uuid::new_v4());

        assert!(h.manager.passes_quota(&app, WORKSPACE, true).await.unwrap());
        assert!(matches!(
            h.manager.get_resource_available(&app, WORKSPACE).await,
            Err(AppError::Configuration(_))
        ));
        assert!(h.store.list_overrides(WORKSPACE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_can_add_file_compares_in_definition_units() {
        let h = harness(vec![workspace(0.5)]).await;
        let user = Entity::user(Uuid::new_v4());
        let gigabyte = 1024u64 * 1024 * 1024;

        assert!(h.manager.can_add_file(&user, WORKSPACE, gigabyte / 4).await.unwrap());
        assert!(!h.manager.can_add_file(&user, WORKSPACE, gigabyte).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_add_file_reads_size_from_disk() {
        let h = harness(vec![workspace(0.5)]).await;
        let user = Entity::user(Uuid::new_v4());
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("small.txt");
        tokio::fs::write(&path, b"tiny").await.unwrap();

        assert!(h
            .manager
            .can_add_file(&user, WORKSPACE, FileCandidate::from_path(&path))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_can_add_file_denies_when_nothing_left() {
        let h = harness(vec![workspace(1.0)]).await;
        let user = Entity::user(Uuid::new_v4());
        assert!(!h.manager.can_add_file(&user, WORKSPACE, 1u64).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_add_file_rejects_wrong_entity_kind() {
        let h = harness(vec![workspace(0.0)]).await;
        let app = Entity::app(Uuid::new_v4());
        let result = h.manager.can_add_file(&app, WORKSPACE, 1u64).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_can_add_file_with_non_byte_units_uses_headroom() {
        let mut spec = test_spec("file_count", vec![EntityKind::User]);
        spec.units = "files".to_string();
        spec.default = 10.0;
        let h = harness(vec![shared(FixedUsageCalculator::new(spec, 3.0))]).await;
        let user = Entity::user(Uuid::new_v4());

        assert!(h
            .manager
            .can_add_file(&user, "user_file_count", 5_000_000u64)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_can_add_file_unlimited_is_allowed() {
        let h = harness(vec![workspace(50.0)]).await;
        h.store
            .update_definition(
                WORKSPACE,
                &DefinitionUpdate {
                    impose_default: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let user = Entity::user(Uuid::new_v4());
        assert!(h.manager.can_add_file(&user, WORKSPACE, u64::MAX).await.unwrap());
    }

    #[tokio::test]
    async fn test_usage_summary_display() {
        let h = harness(vec![workspace(0.5)]).await;
        let user = Entity::user(Uuid::new_v4());

        let summary = h
            .manager
            .usage_summary(&user, WORKSPACE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.display, "512 MB of 1 GB used");
        assert_eq!(summary.available, Some(0.5));

        let staff = Entity::staff(Uuid::new_v4());
        let summary = h
            .manager
            .usage_summary(&staff, WORKSPACE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.display, "512 MB of unlimited used");
        assert_eq!(summary.quota, None);
    }
}
