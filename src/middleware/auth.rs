use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::{Entity, RequestContext},
};

/// Headers set by the gateway in front of this service once it has
/// authenticated the caller.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_STAFF_HEADER: &str = "x-user-staff";
pub const APP_ID_HEADER: &str = "x-app-id";

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, AppError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::Validation(format!("{} is not valid ASCII", name)))?;
    Uuid::parse_str(value.trim())
        .map(Some)
        .map_err(|_| AppError::Validation(format!("{} must be a UUID", name)))
}

fn header_flag(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn user_from_headers(headers: &HeaderMap) -> Result<Option<Entity>, AppError> {
    Ok(header_uuid(headers, USER_ID_HEADER)?.map(|id| Entity::User {
        id,
        is_staff: header_flag(headers, USER_STAFF_HEADER),
    }))
}

fn app_from_headers(headers: &HeaderMap) -> Result<Option<Entity>, AppError> {
    Ok(header_uuid(headers, APP_ID_HEADER)?.map(Entity::app))
}

pub fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext, AppError> {
    Ok(RequestContext {
        user: user_from_headers(headers)?,
        app: app_from_headers(headers)?,
    })
}

/// Like [`context_from_headers`], but a malformed header only drops the
/// entity it describes.
pub fn lenient_context_from_headers(headers: &HeaderMap) -> RequestContext {
    let user = user_from_headers(headers).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring malformed user identity header");
        None
    });
    let app = app_from_headers(headers).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring malformed app identity header");
        None
    });

    RequestContext { user, app }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context_from_headers(&parts.headers)
    }
}

/// A request made by a staff user. Administration routes take this.
#[derive(Debug, Clone)]
pub struct StaffUser {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = context_from_headers(&parts.headers)?;
        match context.user {
            Some(Entity::User { id, is_staff: true }) => Ok(StaffUser { id }),
            _ => Err(AppError::Forbidden),
        }
    }
}
