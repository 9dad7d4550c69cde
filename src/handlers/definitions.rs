use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::auth::StaffUser,
    models::{
        DefinitionUpdate, EntityKind, EntityQuotaOverride, EntityRef, ResourceQuotaDefinition,
        SetOverrideRequest,
    },
    services::sync::SyncReport,
};

async fn existing_definition(state: &AppState, codename: &str) -> Result<ResourceQuotaDefinition> {
    state
        .store
        .find_definition(codename)
        .await?
        .ok_or(AppError::NotFound)
}

fn entity_ref(kind: &str, id: Uuid) -> Result<EntityRef> {
    let kind: EntityKind = kind.parse().map_err(AppError::Validation)?;
    Ok(EntityRef { kind, id })
}

#[utoipa::path(
    get,
    path = "/api/v1/definitions",
    tag = "definitions",
    responses(
        (status = 200, description = "All quota definitions", body = [ResourceQuotaDefinition]),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_definitions(
    State(state): State<AppState>,
    _staff: StaffUser,
) -> Result<Json<Vec<ResourceQuotaDefinition>>> {
    Ok(Json(state.store.list_definitions().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/definitions/{codename}",
    tag = "definitions",
    params(("codename" = String, Path, description = "Definition codename")),
    responses(
        (status = 200, description = "Quota definition", body = ResourceQuotaDefinition),
        (status = 404, description = "No definition with this codename")
    )
)]
pub async fn get_definition(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(codename): Path<String>,
) -> Result<Json<ResourceQuotaDefinition>> {
    Ok(Json(existing_definition(&state, &codename).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/definitions/{codename}",
    tag = "definitions",
    params(("codename" = String, Path, description = "Definition codename")),
    request_body = DefinitionUpdate,
    responses(
        (status = 200, description = "Updated definition", body = ResourceQuotaDefinition),
        (status = 400, description = "Invalid policy values"),
        (status = 404, description = "No definition with this codename")
    )
)]
pub async fn update_definition(
    State(state): State<AppState>,
    staff: StaffUser,
    Path(codename): Path<String>,
    Json(update): Json<DefinitionUpdate>,
) -> Result<Json<ResourceQuotaDefinition>> {
    update.validate()?;

    let definition = state
        .store
        .update_definition(&codename, &update)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(
        %codename,
        staff_id = %staff.id,
        active = definition.active,
        impose_default = definition.impose_default,
        default_quota = definition.default_quota,
        "Quota definition updated"
    );

    Ok(Json(definition))
}

#[utoipa::path(
    get,
    path = "/api/v1/definitions/{codename}/overrides",
    tag = "overrides",
    params(("codename" = String, Path, description = "Definition codename")),
    responses(
        (status = 200, description = "Overrides of this definition", body = [EntityQuotaOverride]),
        (status = 404, description = "No definition with this codename")
    )
)]
pub async fn list_overrides(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(codename): Path<String>,
) -> Result<Json<Vec<EntityQuotaOverride>>> {
    existing_definition(&state, &codename).await?;
    Ok(Json(state.store.list_overrides(&codename).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/definitions/{codename}/overrides/{kind}/{id}",
    tag = "overrides",
    params(
        ("codename" = String, Path, description = "Definition codename"),
        ("kind" = String, Path, description = "Entity kind: user or app"),
        ("id" = Uuid, Path, description = "Entity id")
    ),
    request_body = SetOverrideRequest,
    responses(
        (status = 200, description = "Stored override", body = EntityQuotaOverride),
        (status = 400, description = "Invalid value or entity kind"),
        (status = 404, description = "No definition with this codename")
    )
)]
pub async fn set_override(
    State(state): State<AppState>,
    staff: StaffUser,
    Path((codename, kind, id)): Path<(String, String, Uuid)>,
    Json(request): Json<SetOverrideRequest>,
) -> Result<Json<EntityQuotaOverride>> {
    let entity = entity_ref(&kind, id)?;
    if let Some(value) = request.value {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation(
                "override value must be a non-negative number".to_string(),
            ));
        }
    }

    let definition = existing_definition(&state, &codename).await?;
    if definition.applies_to != entity.kind {
        return Err(AppError::Validation(format!(
            "{} applies to {} entities, not {}",
            codename, definition.applies_to, entity.kind
        )));
    }

    let row = state.store.set_override(&codename, &entity, request.value).await?;
    tracing::info!(%codename, %entity, value = ?request.value, staff_id = %staff.id, "Quota override set");

    Ok(Json(row))
}

#[utoipa::path(
    delete,
    path = "/api/v1/definitions/{codename}/overrides/{kind}/{id}",
    tag = "overrides",
    params(
        ("codename" = String, Path, description = "Definition codename"),
        ("kind" = String, Path, description = "Entity kind: user or app"),
        ("id" = Uuid, Path, description = "Entity id")
    ),
    responses(
        (status = 204, description = "Override removed"),
        (status = 404, description = "No such override")
    )
)]
pub async fn delete_override(
    State(state): State<AppState>,
    staff: StaffUser,
    Path((codename, kind, id)): Path<(String, String, Uuid)>,
) -> Result<StatusCode> {
    let entity = entity_ref(&kind, id)?;
    if !state.store.delete_override(&codename, &entity).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(%codename, %entity, staff_id = %staff.id, "Quota override removed");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/sync",
    tag = "definitions",
    responses(
        (status = 200, description = "Definitions reconciled with the configured handlers"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn sync_definitions(
    State(state): State<AppState>,
    staff: StaffUser,
) -> Result<Json<serde_json::Value>> {
    let report: SyncReport = state.sync.sync(&state.config.handlers).await?;
    tracing::info!(
        staff_id = %staff.id,
        created = report.created.len(),
        deleted = report.deleted.len(),
        skipped = report.skipped.len(),
        "Quota definitions synced on request"
    );

    Ok(Json(json!({
        "message": "Quota definitions synced",
        "data": report
    })))
}
