use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    calculators::CalculatorRegistry,
    errors::Result,
    models::{EntityKind, ResourceQuotaDefinition},
    services::metrics::MetricsService,
    storage::QuotaStore,
};

#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub skipped: Vec<String>,
}

impl SyncReport {
    /// True when the store already matched the handler set.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Reconciles persisted definitions with the configured calculators.
///
/// The only code path that creates or deletes definitions. Runs are
/// serialized.
pub struct QuotaSync {
    store: Arc<dyn QuotaStore>,
    registry: Arc<CalculatorRegistry>,
    metrics: Arc<MetricsService>,
    lock: Mutex<()>,
}

impl QuotaSync {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        registry: Arc<CalculatorRegistry>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            store,
            registry,
            metrics,
            lock: Mutex::new(()),
        }
    }

    /// Sync every calculator in the registry.
    pub async fn sync_registered(&self) -> Result<SyncReport> {
        self.sync(&self.registry.codenames()).await
    }

    /// Sync the calculators named by `handler_refs`.
    ///
    /// Unknown references and calculators with malformed metadata are skipped
    /// with a warning. Definitions for anything not synced are deleted.
    pub async fn sync(&self, handler_refs: &[String]) -> Result<SyncReport> {
        let _guard = self.lock.lock().await;
        let mut report = SyncReport::default();
        let mut expected: Vec<String> = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for handler_ref in handler_refs {
            let handler_ref = handler_ref.trim();
            if seen.contains(&handler_ref) {
                continue;
            }
            seen.push(handler_ref);

            let Some(calculator) = self.registry.get(handler_ref) else {
                tracing::warn!(handler = %handler_ref, "Skipping quota handler: no usage calculator registered under this name");
                report.skipped.push(handler_ref.to_string());
                continue;
            };

            let spec = calculator.spec();
            if let Err(reason) = spec.validate() {
                tracing::warn!(handler = %handler_ref, %reason, "Skipping quota handler with invalid metadata");
                report.skipped.push(handler_ref.to_string());
                continue;
            }

            let mut kinds: Vec<EntityKind> = Vec::with_capacity(spec.applies_to.len());
            for kind in &spec.applies_to {
                if !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
            for kind in kinds {
                let definition = ResourceQuotaDefinition::from_spec(spec, kind);
                if self.store.insert_definition(&definition).await? {
                    tracing::info!(codename = %definition.codename, "Created resource quota definition");
                    report.created.push(definition.codename.clone());
                }
                if !expected.contains(&definition.codename) {
                    expected.push(definition.codename);
                }
            }
        }

        report.deleted = self.store.retain_definitions(&expected).await?;
        for codename in &report.deleted {
            tracing::info!(%codename, "Deleted resource quota definition with no registered handler");
        }

        self.metrics.record_sync(
            report.created.len(),
            report.deleted.len(),
            report.skipped.len(),
        );

        Ok(report)
    }
}
