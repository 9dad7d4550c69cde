//! Resource quota governance.
//!
//! Usage calculators measure how much of a resource an entity (a user or an
//! installed app) consumes. Each calculator is synced into one quota
//! definition per entity kind, administrators tune definitions and set
//! per-entity overrides, and the admission engine answers whether an
//! operation may go ahead.

pub mod calculators;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{admission, definitions, docs, health, metrics, AppState};

pub use crate::calculators::{CalculatorRegistry, CalculatorSpec, UsageCalculator};
pub use crate::errors::{AppError, Result};
pub use crate::services::{QuotaManager, QuotaSync};

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/admission/check", post(admission::check_admission))
        .route("/admission/available", post(admission::resource_available))
        .route("/admission/usage", post(admission::usage_summary))
        .route("/definitions", get(definitions::list_definitions))
        .route(
            "/definitions/:codename",
            get(definitions::get_definition).patch(definitions::update_definition),
        )
        .route(
            "/definitions/:codename/overrides",
            get(definitions::list_overrides),
        )
        .route(
            "/definitions/:codename/overrides/:kind/:id",
            put(definitions::set_override).delete(definitions::delete_override),
        )
        .route("/admin/sync", post(definitions::sync_definitions))
}

/// Build the full application router around `state`.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_routes())
        .merge(docs::create_docs_router())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
