use std::sync::Arc;

use crate::{
    calculators::CalculatorRegistry,
    config::Config,
    errors::Result,
    services::{
        metrics::MetricsService, quota_manager::QuotaManager, redis::RedisService,
        sync::QuotaSync,
    },
    storage::QuotaStore,
};

pub mod admission;
pub mod definitions;
pub mod docs;
pub mod health;
pub mod metrics;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuotaStore>,
    pub registry: Arc<CalculatorRegistry>,
    pub manager: Arc<QuotaManager>,
    pub sync: Arc<QuotaSync>,
    pub redis: Option<RedisService>,
    pub config: Config,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    /// Wire the services around a store and a calculator registry.
    pub fn new(
        store: Arc<dyn QuotaStore>,
        registry: CalculatorRegistry,
        config: Config,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        let metrics = Arc::new(MetricsService::new()?);
        let manager = QuotaManager::new(store.clone(), registry.clone(), metrics.clone())
            .with_optional_codenames(config.optional_codenames.clone());
        let sync = QuotaSync::new(store.clone(), registry.clone(), metrics.clone());

        Ok(Self {
            store,
            registry,
            manager: Arc::new(manager),
            sync: Arc::new(sync),
            redis: None,
            config,
            metrics,
        })
    }

    pub fn with_redis(mut self, redis: RedisService) -> Self {
        self.redis = Some(redis);
        self
    }
}
