// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unauthenticated viewing endpoints. The token is the only credential and
//! each successful call consumes the share.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use super::identity::ClientIp;
use crate::{
    error::{ApiError, ErrorBody},
    models::SharedContentResponse,
    policy::RequestContext,
    providers::{ResourceKind, DEFAULT_DOCUMENT_MIME_TYPE},
    state::AppState,
};

/// Attachment name used when the stored name has nothing usable left.
pub const FALLBACK_FILE_NAME: &str = "download";

#[utoipa::path(
    get,
    path = "/api/v1/shared/{token}",
    params(("token" = String, Path, description = "Share token from the deep link")),
    tag = "Public",
    responses(
        (status = 200, body = SharedContentResponse),
        (status = 403, description = "Blocked by an access policy", body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Already viewed", body = ErrorBody),
        (status = 410, description = "Revoked", body = ErrorBody)
    )
)]
pub async fn view_shared(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Path(token): Path<String>,
) -> Result<Json<SharedContentResponse>, ApiError> {
    let viewed = state
        .shares
        .view_shared_content(&token, &RequestContext::at_now(client_ip))
        .await?;
    Ok(Json(SharedContentResponse::from(&viewed)))
}

/// Same as [`view_shared`], but documents come back as the raw file.
#[utoipa::path(
    get,
    path = "/api/v1/shared/{token}/download",
    params(("token" = String, Path, description = "Share token from the deep link")),
    tag = "Public",
    responses(
        (status = 200, description = "Document bytes, or JSON for secrets"),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody),
        (status = 410, body = ErrorBody)
    )
)]
pub async fn download_shared(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let viewed = state
        .shares
        .view_shared_content(&token, &RequestContext::at_now(client_ip))
        .await?;

    if viewed.resource_type != ResourceKind::Document {
        return Ok(Json(SharedContentResponse::from(&viewed)).into_response());
    }

    let content_type = HeaderValue::from_str(&viewed.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_DOCUMENT_MIME_TYPE));
    let file_name = attachment_name(&viewed.resource_name);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    info!(bytes = viewed.content.len(), "Serving shared document download");
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        viewed.content,
    )
        .into_response())
}

/// Strip anything that could break out of the quoted `filename` parameter
/// or name a path.
pub fn attachment_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\\' | '/' | ';'))
        .filter(|c| c.is_ascii())
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};

    use crate::service::lifecycle::testing::{actor, lifecycle, secret_request, token_of};

    fn state() -> AppState {
        let (lifecycle, _) = lifecycle();
        AppState::new(lifecycle, None)
    }

    async fn share(state: &AppState, resource_type: &str) -> String {
        let mut request = secret_request();
        request.resource_type = resource_type.to_string();
        let created = state
            .shares
            .create_share(&actor(), request)
            .await
            .unwrap();
        token_of(&created.share_link)
    }

    fn ip() -> ClientIp {
        ClientIp("203.0.113.5".to_string())
    }

    #[tokio::test]
    async fn secret_is_shown_once() {
        let state = state();
        let token = share(&state, "SECRET").await;

        let Json(body) = view_shared(State(state.clone()), ip(), Path(token.clone()))
            .await
            .unwrap();
        assert_eq!(body.resource_type, ResourceKind::Secret);
        assert_eq!(body.password.as_deref(), Some("hunter2"));
        assert!(body.file_content.is_none());

        let err = view_shared(State(state), ip(), Path(token)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.error_code, "already_viewed");
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let err = view_shared(State(state()), ip(), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn document_download_returns_attachment() {
        let state = state();
        let token = share(&state, "DOCUMENT").await;

        let response = download_shared(State(state.clone()), ip(), Path(token.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, "attachment; filename=\"secret-1 name\"");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"%PDF");

        let err = download_shared(State(state), ip(), Path(token))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn secret_download_falls_back_to_json() {
        let state = state();
        let token = share(&state, "SECRET").await;
        let response = download_shared(State(state), ip(), Path(token))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn attachment_names_are_sanitized() {
        assert_eq!(attachment_name("report.pdf"), "report.pdf");
        assert_eq!(attachment_name("../etc/passwd"), "etcpasswd");
        assert_eq!(attachment_name("a\"b;c\r\n.txt"), "abc.txt");
        assert_eq!(attachment_name("  "), FALLBACK_FILE_NAME);
        assert_eq!(attachment_name("..."), FALLBACK_FILE_NAME);
    }
}
