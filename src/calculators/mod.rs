//! Pluggable usage calculators.
//!
//! A calculator knows how to measure one resource kind for an entity. Hosts
//! register calculators at wiring time; [`crate::services::QuotaSync`] turns
//! each one into a definition per entity kind it applies to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::models::{Entity, EntityKind};
use crate::services::redis::RedisService;

pub mod counter;
pub mod workspace;

pub use counter::RedisCounterCalculator;
pub use workspace::WorkspaceStorageCalculator;

/// Metadata a calculator contributes to the definitions it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorSpec {
    pub codename: String,
    pub name: String,
    pub description: String,
    pub default: f64,
    pub units: String,
    pub help: String,
    pub applies_to: Vec<EntityKind>,
}

impl CalculatorSpec {
    /// Check the metadata is usable for creating definitions.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.codename.trim().is_empty() {
            return Err("codename is empty".to_string());
        }
        if self.codename.chars().any(char::is_whitespace) {
            return Err(format!("codename '{}' contains whitespace", self.codename));
        }
        if self.applies_to.is_empty() {
            return Err(format!("{} applies to no entity kinds", self.codename));
        }
        if !self.default.is_finite() || self.default < 0.0 {
            return Err(format!("{} has invalid default {}", self.codename, self.default));
        }
        if self.units.trim().is_empty() {
            return Err(format!("{} has no units", self.codename));
        }
        Ok(())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageCalculator: Send + Sync {
    fn spec(&self) -> &CalculatorSpec;

    /// Current consumption by `entity`, in the units the calculator reports.
    async fn current_use(&self, entity: &Entity) -> Result<f64>;
}

/// Calculators available to this process, keyed by codename.
#[derive(Default, Clone)]
pub struct CalculatorRegistry {
    calculators: BTreeMap<String, Arc<dyn UsageCalculator>>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, calculator: Arc<dyn UsageCalculator>) -> Result<()> {
        let codename = calculator.spec().codename.clone();
        if self.calculators.contains_key(&codename) {
            return Err(AppError::Configuration(format!(
                "usage calculator '{}' registered twice",
                codename
            )));
        }
        tracing::debug!(calculator = %codename, "Registered usage calculator");
        self.calculators.insert(codename, calculator);
        Ok(())
    }

    pub fn with(mut self, calculator: Arc<dyn UsageCalculator>) -> Result<Self> {
        self.register(calculator)?;
        Ok(self)
    }

    pub fn get(&self, codename: &str) -> Option<Arc<dyn UsageCalculator>> {
        self.calculators.get(codename).cloned()
    }

    pub fn codenames(&self) -> Vec<String> {
        self.calculators.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }
}

impl std::fmt::Debug for CalculatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorRegistry")
            .field("calculators", &self.codenames())
            .finish()
    }
}

/// The built-in calculators for this deployment: workspace storage, plus one
/// counter calculator per configured Redis counter when Redis is available.
pub fn build_registry(config: &Config, redis: Option<&RedisService>) -> Result<CalculatorRegistry> {
    let mut registry = CalculatorRegistry::new();
    registry.register(Arc::new(WorkspaceStorageCalculator::new(
        &config.workspace_root,
        config.workspace_default_gb,
    )))?;

    match redis {
        Some(redis) => {
            for counter in &config.redis_counters {
                registry.register(Arc::new(RedisCounterCalculator::for_counter(
                    counter,
                    config.redis_counter_default,
                    redis.clone(),
                )))?;
            }
        }
        None if !config.redis_counters.is_empty() => {
            tracing::warn!(
                counters = ?config.redis_counters,
                "Redis counters configured without QUOTA_REDIS_URL, not registering them"
            );
        }
        None => {}
    }

    Ok(registry)
}

/// A calculator with a fixed reading, handy for wiring tests and demos.
#[derive(Debug, Clone)]
pub struct FixedUsageCalculator {
    spec: CalculatorSpec,
    current_use: f64,
}

impl FixedUsageCalculator {
    pub fn new(spec: CalculatorSpec, current_use: f64) -> Self {
        Self { spec, current_use }
    }
}

#[async_trait]
impl UsageCalculator for FixedUsageCalculator {
    fn spec(&self) -> &CalculatorSpec {
        &self.spec
    }

    async fn current_use(&self, _entity: &Entity) -> Result<f64> {
        Ok(self.current_use)
    }
}

#[cfg(test)]
pub(crate) fn test_spec(codename: &str, applies_to: Vec<EntityKind>) -> CalculatorSpec {
    CalculatorSpec {
        codename: codename.to_string(),
        name: format!("{} name", codename),
        description: format!("{} description", codename),
        default: 1.0,
        units: "GB".to_string(),
        help: format!("{} exceeded, free some space", codename),
        applies_to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validation() {
        assert!(test_spec("workspace_quota", vec![EntityKind::User]).validate().is_ok());
        assert!(test_spec("", vec![EntityKind::User]).validate().is_err());
        assert!(test_spec("bad name", vec![EntityKind::User]).validate().is_err());
        assert!(test_spec("no_kinds", vec![]).validate().is_err());

        let mut spec = test_spec("nan_default", vec![EntityKind::App]);
        spec.default = f64::NAN;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_build_registry_without_redis() {
        let config = Config {
            redis_counters: vec!["api_calls".to_string()],
            ..Config::default()
        };
        let registry = build_registry(&config, None).unwrap();
        assert_eq!(registry.codenames(), vec!["workspace_quota".to_string()]);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let spec = test_spec("workspace_quota", vec![EntityKind::User]);
        let mut registry = CalculatorRegistry::new();
        registry
            .register(Arc::new(FixedUsageCalculator::new(spec.clone(), 0.0)))
            .unwrap();

        let result = registry.register(Arc::new(FixedUsageCalculator::new(spec, 1.0)));
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("workspace_quota").is_some());
        assert!(registry.get("missing").is_none());
    }
}
