use async_trait::async_trait;
use redis::AsyncCommands;

use crate::{
    calculators::{CalculatorSpec, UsageCalculator},
    errors::{AppError, Result},
    models::{Entity, EntityKind, EntityRef},
    services::redis::RedisService,
};

/// Reads a usage counter the host keeps in Redis, e.g. API calls this month.
pub struct RedisCounterCalculator {
    spec: CalculatorSpec,
    redis: RedisService,
}

impl RedisCounterCalculator {
    pub fn new(spec: CalculatorSpec, redis: RedisService) -> Self {
        Self { spec, redis }
    }

    /// A calculator for `counter` applying to both entity kinds.
    pub fn for_counter(counter: &str, default: f64, redis: RedisService) -> Self {
        Self::new(
            CalculatorSpec {
                codename: counter.trim().to_string(),
                name: counter.trim().replace('_', " "),
                description: format!("Value of the {} counter", counter.trim()),
                default,
                units: "calls".to_string(),
                help: "You have used up this allowance. Ask an administrator to raise it."
                    .to_string(),
                applies_to: vec![EntityKind::User, EntityKind::App],
            },
            redis,
        )
    }

    pub fn counter_key(entity: &EntityRef, counter: &str) -> String {
        format!("usage:{}:{}:{}", entity.kind, entity.id, counter)
    }
}

#[async_trait]
impl UsageCalculator for RedisCounterCalculator {
    fn spec(&self) -> &CalculatorSpec {
        &self.spec
    }

    async fn current_use(&self, entity: &Entity) -> Result<f64> {
        let key = Self::counter_key(&entity.reference(), &self.spec.codename);
        let mut conn = self.redis.connection_manager().clone();

        let value: Option<i64> = conn.get(&key).await.map_err(|e| {
            AppError::Calculator(format!("failed to read counter {}: {}", key, e))
        })?;

        Ok(value.unwrap_or(0) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_counter_key_layout() {
        let id = Uuid::nil();
        let key = RedisCounterCalculator::counter_key(
            &EntityRef {
                kind: EntityKind::App,
                id,
            },
            "api_calls",
        );
        assert_eq!(key, format!("usage:app:{}:api_calls", id));
    }
}
