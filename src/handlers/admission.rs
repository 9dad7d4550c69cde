use axum::{extract::State, response::Json};
use serde_json::json;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    models::{AdmissionRequest, AdmissionResponse, EntityQuery, UsageSummary},
};

#[utoipa::path(
    post,
    path = "/api/v1/admission/check",
    tag = "admission",
    request_body = AdmissionRequest,
    responses(
        (status = 200, description = "Admission decision", body = AdmissionResponse),
        (status = 403, description = "Quota exceeded and raise_on_false was set")
    )
)]
pub async fn check_admission(
    State(state): State<AppState>,
    Json(request): Json<AdmissionRequest>,
) -> Result<Json<AdmissionResponse>> {
    let allowed = match request.file_size {
        Some(file_size) => {
            let allowed = state
                .manager
                .can_add_file(&request.entity, &request.codename, file_size)
                .await?;
            if !allowed && request.raise_on_false {
                let help = state
                    .store
                    .find_definition(&request.codename)
                    .await?
                    .map(|definition| definition.help)
                    .unwrap_or_default();
                return Err(AppError::QuotaExceeded {
                    codename: request.codename,
                    help,
                });
            }
            allowed
        }
        None => {
            state
                .manager
                .passes_quota(&request.entity, &request.codename, request.raise_on_false)
                .await?
        }
    };

    Ok(Json(AdmissionResponse {
        codename: request.codename,
        allowed,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admission/available",
    tag = "admission",
    request_body = EntityQuery,
    responses((status = 200, description = "Remaining headroom, null when unlimited or unknown"))
)]
pub async fn resource_available(
    State(state): State<AppState>,
    Json(query): Json<EntityQuery>,
) -> Result<Json<serde_json::Value>> {
    let availability = state
        .manager
        .get_resource_available(&query.entity, &query.codename)
        .await?;

    Ok(Json(json!({
        "codename": query.codename,
        "availability": availability
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/admission/usage",
    tag = "admission",
    request_body = EntityQuery,
    responses(
        (status = 200, description = "Usage against the effective quota", body = UsageSummary),
        (status = 404, description = "No definition with this codename")
    )
)]
pub async fn usage_summary(
    State(state): State<AppState>,
    Json(query): Json<EntityQuery>,
) -> Result<Json<UsageSummary>> {
    state
        .manager
        .usage_summary(&query.entity, &query.codename)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}
