//! Transport mapping for mission errors and caller identity.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use survey_core::error::{ErrorKind, MissionError};
use survey_core::models::{Caller, Role};

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Debug)]
pub enum ApiError {
    /// Identity headers missing or malformed
    Unauthorized(String),
    BadRequest(String),
    Mission(MissionError),
}

impl From<MissionError> for ApiError {
    fn from(err: MissionError) -> Self {
        Self::Mission(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidBoundary | ErrorKind::InvalidParameters | ErrorKind::InvalidProgress => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::InvalidStateTransition => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::DependencyFailure => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, json!("unauthorized"), message),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, json!("bad_request"), message),
            Self::Mission(err) => (status_for(err.kind()), json!(err.kind()), err.to_string()),
        };
        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

/// Read the already-authenticated caller from request headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let organization_id = header_value(headers, ORGANIZATION_HEADER)?;
    let user_id = header_value(headers, USER_HEADER)?;
    let raw_role = header_value(headers, ROLE_HEADER)?;
    let role = Role::parse(&raw_role)
        .ok_or_else(|| ApiError::Unauthorized(format!("unknown role {:?}", raw_role)))?;
    Ok(Caller::new(organization_id, user_id, role))
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn caller_requires_all_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ORGANIZATION_HEADER, HeaderValue::from_static("org-1"));
        headers.insert(USER_HEADER, HeaderValue::from_static("u-1"));
        assert!(matches!(caller_from_headers(&headers), Err(ApiError::Unauthorized(_))));

        headers.insert(ROLE_HEADER, HeaderValue::from_static("Operator"));
        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller.role, Role::Operator);
        assert_eq!(caller.organization_id, "org-1");
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::InvalidStateTransition), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidProgress), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::DependencyFailure), StatusCode::SERVICE_UNAVAILABLE);
    }
}
