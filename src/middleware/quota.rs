use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;

use crate::{middleware::auth::lenient_context_from_headers, services::quota_manager::QuotaManager};

#[derive(Clone)]
pub struct GuardState {
    pub manager: Arc<QuotaManager>,
    pub codename: String,
}

/// Runs the quota guard before the wrapped route. Only an exceeded quota
/// stops the request, answered with a 403 carrying the definition's help text.
/// Malformed identity headers are ignored here, not rejected.
pub async fn quota_guard(
    State(guard): State<GuardState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let context = lenient_context_from_headers(&headers);
    if let Err(e) = guard.manager.guard(&context, &guard.codename).await {
        return e.into_response();
    }

    next.run(request).await
}

/// Protect every route in `router` with the quota named `codename`.
pub fn guarded<S>(router: Router<S>, manager: Arc<QuotaManager>, codename: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        GuardState {
            manager,
            codename: codename.to_string(),
        },
        quota_guard,
    ))
}
