use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::{
    calculators::{CalculatorSpec, UsageCalculator},
    errors::{AppError, Result},
    models::{Entity, EntityKind},
    utils::{directory_size, StorageUnit},
};

pub const WORKSPACE_QUOTA: &str = "workspace_quota";

/// Measures the bytes stored under `{root}/{kind}/{id}`.
pub struct WorkspaceStorageCalculator {
    spec: CalculatorSpec,
    unit: StorageUnit,
    base_path: PathBuf,
}

impl WorkspaceStorageCalculator {
    pub fn new<P: AsRef<Path>>(base_path: P, default_gb: f64) -> Self {
        Self {
            spec: CalculatorSpec {
                codename: WORKSPACE_QUOTA.to_string(),
                name: "Workspace storage".to_string(),
                description: "Total size of the files kept in the workspace".to_string(),
                default: default_gb,
                units: "GB".to_string(),
                help: "Your workspace is full. Delete some files or ask an administrator for more space."
                    .to_string(),
                applies_to: vec![EntityKind::User, EntityKind::App],
            },
            unit: StorageUnit::Gigabyte,
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Report usage in another storage unit (`"MB"`, `"TB"`, ...).
    pub fn with_units(mut self, units: &str) -> Result<Self> {
        self.unit = units.parse().map_err(|_| {
            AppError::Configuration(format!("'{}' is not a storage unit", units))
        })?;
        self.spec.units = units.trim().to_string();
        Ok(self)
    }

    pub fn workspace_path(&self, entity: &Entity) -> PathBuf {
        self.base_path
            .join(entity.kind().as_str())
            .join(entity.id().to_string())
    }
}

#[async_trait]
impl UsageCalculator for WorkspaceStorageCalculator {
    fn spec(&self) -> &CalculatorSpec {
        &self.spec
    }

    async fn current_use(&self, entity: &Entity) -> Result<f64> {
        let path = self.workspace_path(entity);
        let bytes = directory_size(&path).await.map_err(|e| {
            AppError::Calculator(format!("failed to size {}: {}", path.display(), e))
        })?;
        Ok(bytes as f64 / self.unit.bytes())
    }
}
