// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::service::ShareError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
}

/// JSON error body returned by every endpoint.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }
}

impl From<ShareError> for ApiError {
    fn from(err: ShareError) -> Self {
        let (status, code) = match &err {
            ShareError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ShareError::AlreadyViewed => (StatusCode::CONFLICT, "already_viewed"),
            ShareError::Revoked => (StatusCode::GONE, "revoked"),
            ShareError::AccessDenied(_) => (StatusCode::FORBIDDEN, "access_denied"),
            ShareError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            ShareError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ShareError::UpstreamUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream_unavailable")
            }
            ShareError::Encryption(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encryption_error"),
            ShareError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        Self::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn share_errors_map_to_status() {
        let cases = [
            (ShareError::not_found("x"), StatusCode::NOT_FOUND, "not_found"),
            (ShareError::AlreadyViewed, StatusCode::CONFLICT, "already_viewed"),
            (ShareError::Revoked, StatusCode::GONE, "revoked"),
            (
                ShareError::AccessDenied("nope".into()),
                StatusCode::FORBIDDEN,
                "access_denied",
            ),
            (ShareError::invalid("bad"), StatusCode::BAD_REQUEST, "invalid_input"),
            (ShareError::Conflict("dup".into()), StatusCode::CONFLICT, "conflict"),
            (
                ShareError::UpstreamUnavailable("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_unavailable",
            ),
            (
                ShareError::Encryption("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "encryption_error",
            ),
            (
                ShareError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.error_code, code);
        }
    }

    #[test]
    fn denial_reason_is_the_message() {
        let api = ApiError::from(ShareError::AccessDenied(
            "access denied: not in IP whitelist".into(),
        ));
        assert_eq!(api.message, "access denied: not in IP whitelist");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","error_code":"invalid_input"}"#);
    }
}
