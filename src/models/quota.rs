use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Entity;

/// Effective quota for an entity under one definition. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResolvedQuota {
    pub quota: Option<f64>,
    pub units: Option<String>,
}

impl ResolvedQuota {
    pub fn unresolved() -> Self {
        Self {
            quota: None,
            units: None,
        }
    }

    pub fn unlimited(units: &str) -> Self {
        Self {
            quota: None,
            units: Some(units.to_string()),
        }
    }

    pub fn limited(quota: f64, units: &str) -> Self {
        Self {
            quota: Some(quota),
            units: Some(units.to_string()),
        }
    }
}

/// Remaining headroom, in the definition's units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Availability {
    pub available: f64,
    pub units: String,
}

/// Usage rendering for administrators.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UsageSummary {
    pub codename: String,
    pub used: f64,
    pub quota: Option<f64>,
    pub available: Option<f64>,
    pub units: String,
    pub display: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdmissionRequest {
    pub entity: Entity,
    pub codename: String,
    /// Size in bytes of a file about to be added; switches to file admission.
    pub file_size: Option<u64>,
    #[serde(default)]
    pub raise_on_false: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdmissionResponse {
    pub codename: String,
    pub allowed: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EntityQuery {
    pub entity: Entity,
    pub codename: String,
}
