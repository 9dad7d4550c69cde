use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::{
    errors::{AppError, Result},
    models::{DefinitionUpdate, EntityQuotaOverride, EntityRef, ResourceQuotaDefinition},
    storage::QuotaStore,
};

#[derive(Default)]
struct Tables {
    definitions: BTreeMap<String, ResourceQuotaDefinition>,
    overrides: HashMap<(String, EntityRef), EntityQuotaOverride>,
}

/// Process-local store. Used by tests and single-node deployments.
#[derive(Default)]
pub struct MemoryQuotaStore {
    tables: RwLock<Tables>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing_definition(codename: &str) -> AppError {
    AppError::Configuration(format!("no quota definition named '{}'", codename))
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn list_definitions(&self) -> Result<Vec<ResourceQuotaDefinition>> {
        let tables = self.tables.read().await;
        Ok(tables.definitions.values().cloned().collect())
    }

    async fn find_definition(&self, codename: &str) -> Result<Option<ResourceQuotaDefinition>> {
        let tables = self.tables.read().await;
        Ok(tables.definitions.get(codename).cloned())
    }

    async fn insert_definition(&self, definition: &ResourceQuotaDefinition) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.definitions.contains_key(&definition.codename) {
            return Ok(false);
        }
        tables
            .definitions
            .insert(definition.codename.clone(), definition.clone());
        Ok(true)
    }

    async fn update_definition(
        &self,
        codename: &str,
        update: &DefinitionUpdate,
    ) -> Result<Option<ResourceQuotaDefinition>> {
        let mut tables = self.tables.write().await;
        Ok(tables.definitions.get_mut(codename).map(|definition| {
            definition.apply(update);
            definition.clone()
        }))
    }

    async fn retain_definitions(&self, keep: &[String]) -> Result<Vec<String>> {
        let mut tables = self.tables.write().await;
        let doomed: Vec<String> = tables
            .definitions
            .keys()
            .filter(|codename| !keep.contains(codename))
            .cloned()
            .collect();

        for codename in &doomed {
            tables.definitions.remove(codename);
        }
        tables
            .overrides
            .retain(|(codename, _), _| !doomed.contains(codename));

        Ok(doomed)
    }

    async fn find_override(
        &self,
        codename: &str,
        entity: &EntityRef,
    ) -> Result<Option<EntityQuotaOverride>> {
        let tables = self.tables.read().await;
        Ok(tables
            .overrides
            .get(&(codename.to_string(), *entity))
            .cloned())
    }

    async fn ensure_override(
        &self,
        codename: &str,
        entity: &EntityRef,
    ) -> Result<EntityQuotaOverride> {
        let mut tables = self.tables.write().await;
        if !tables.definitions.contains_key(codename) {
            return Err(missing_definition(codename));
        }
        Ok(tables
            .overrides
            .entry((codename.to_string(), *entity))
            .or_insert_with(|| EntityQuotaOverride::new(codename, *entity, None))
            .clone())
    }

    async fn set_override(
        &self,
        codename: &str,
        entity: &EntityRef,
        value: Option<f64>,
    ) -> Result<EntityQuotaOverride> {
        let mut tables = self.tables.write().await;
        if !tables.definitions.contains_key(codename) {
            return Err(missing_definition(codename));
        }
        let row = tables
            .overrides
            .entry((codename.to_string(), *entity))
            .or_insert_with(|| EntityQuotaOverride::new(codename, *entity, None));
        row.value = value;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_override(&self, codename: &str, entity: &EntityRef) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .overrides
            .remove(&(codename.to_string(), *entity))
            .is_some())
    }

    async fn list_overrides(&self, codename: &str) -> Result<Vec<EntityQuotaOverride>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<EntityQuotaOverride> = tables
            .overrides
            .values()
            .filter(|row| row.codename == codename)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.created_at);
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::test_spec;
    use crate::models::EntityKind;
    use std::sync::Arc;
    use uuid::Uuid;

    fn definition() -> ResourceQuotaDefinition {
        ResourceQuotaDefinition::from_spec(
            &test_spec("workspace_quota", vec![EntityKind::User]),
            EntityKind::User,
        )
    }

    fn user_ref() -> EntityRef {
        EntityRef {
            kind: EntityKind::User,
            id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_insert_definition_is_insert_or_ignore() {
        let store = MemoryQuotaStore::new();
        assert!(store.insert_definition(&definition()).await.unwrap());
        assert!(!store.insert_definition(&definition()).await.unwrap());
        assert_eq!(store.list_definitions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retain_definitions_cascades_to_overrides() {
        let store = MemoryQuotaStore::new();
        store.insert_definition(&definition()).await.unwrap();
        let entity = user_ref();
        store
            .set_override("user_workspace_quota", &entity, Some(3.0))
            .await
            .unwrap();

        let deleted = store.retain_definitions(&[]).await.unwrap();
        assert_eq!(deleted, vec!["user_workspace_quota".to_string()]);
        assert!(store
            .find_override("user_workspace_quota", &entity)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_override_creates_one_row() {
        let store = Arc::new(MemoryQuotaStore::new());
        store.insert_definition(&definition()).await.unwrap();
        let entity = user_ref();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.ensure_override("user_workspace_quota", &entity).await
            }));
        }
        for handle in handles {
            let row = handle.await.unwrap().unwrap();
            assert_eq!(row.value, None);
        }

        let rows = store.list_overrides("user_workspace_quota").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_override_requires_definition() {
        let store = MemoryQuotaStore::new();
        let result = store.set_override("nope", &user_ref(), Some(1.0)).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_ensure_override_keeps_existing_value() {
        let store = MemoryQuotaStore::new();
        store.insert_definition(&definition()).await.unwrap();
        let entity = user_ref();
        store
            .set_override("user_workspace_quota", &entity, Some(2.0))
            .await
            .unwrap();

        let row = store
            .ensure_override("user_workspace_quota", &entity)
            .await
            .unwrap();
        assert_eq!(row.value, Some(2.0));
    }
}
