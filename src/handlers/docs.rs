use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
        crate::handlers::admission::check_admission,
        crate::handlers::admission::resource_available,
        crate::handlers::admission::usage_summary,
        crate::handlers::definitions::list_definitions,
        crate::handlers::definitions::get_definition,
        crate::handlers::definitions::update_definition,
        crate::handlers::definitions::list_overrides,
        crate::handlers::definitions::set_override,
        crate::handlers::definitions::delete_override,
        crate::handlers::definitions::sync_definitions,
    ),
    components(
        schemas(
            crate::models::Entity,
            crate::models::EntityKind,
            crate::models::EntityRef,
            crate::models::ResourceQuotaDefinition,
            crate::models::DefinitionUpdate,
            crate::models::EntityQuotaOverride,
            crate::models::SetOverrideRequest,
            crate::models::Availability,
            crate::models::UsageSummary,
            crate::models::AdmissionRequest,
            crate::models::AdmissionResponse,
            crate::models::EntityQuery,
        )
    ),
    tags(
        (name = "admission", description = "Quota checks for callers"),
        (name = "definitions", description = "Quota definition administration"),
        (name = "overrides", description = "Per-entity quota overrides"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Quota Governor API",
        version = "0.1.0",
        description = "Resource quota definitions, overrides and admission checks"
    )
)]
pub struct ApiDoc;

pub fn create_docs_router() -> Router<AppState> {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
