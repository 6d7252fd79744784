// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{ApiError, ErrorBody},
    models::{
        CreateShareRequest, CreateShareResponse, ListPoliciesResponse, ListSharesQuery,
        ListSharesResponse, PolicyInput, ShareDetailsResponse, ShareLinkResponse,
    },
    policy::SharePolicy,
    providers::ResourceKind,
    service::Actor,
    state::AppState,
    storage::{PageRequest, ShareLinkFilter},
};

#[utoipa::path(
    post,
    path = "/v1/shares",
    request_body = CreateShareRequest,
    tag = "Shares",
    responses(
        (status = 201, body = CreateShareResponse),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
pub async fn create_share(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<CreateShareResponse>), ApiError> {
    let created = state.shares.create_share(&actor, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateShareResponse {
            share_id: created.share_id,
            share_link: created.share_link,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/shares",
    params(ListSharesQuery),
    tag = "Shares",
    responses(
        (status = 200, body = ListSharesResponse),
        (status = 400, body = ErrorBody)
    )
)]
pub async fn list_shares(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListSharesQuery>,
) -> Result<Json<ListSharesResponse>, ApiError> {
    let resource_type = match query.resource_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            ResourceKind::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown resource type {raw:?}")))?,
        ),
    };
    let filter = ShareLinkFilter {
        resource_type,
        recipient_email: query.recipient_email,
    };
    let page = PageRequest::new(query.page.unwrap_or(0), query.page_size.unwrap_or(0));

    let (links, total) = state.shares.list_shares(&actor, &filter, page).await?;
    Ok(Json(ListSharesResponse {
        items: links.iter().map(ShareLinkResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/shares/{share_id}",
    params(("share_id" = String, Path, description = "Share link identifier")),
    tag = "Shares",
    responses(
        (status = 200, body = ShareDetailsResponse),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(share_id): Path<String>,
) -> Result<Json<ShareDetailsResponse>, ApiError> {
    let details = state.shares.get_share(&actor, &share_id).await?;
    Ok(Json(ShareDetailsResponse {
        share: ShareLinkResponse::from(&details.link),
        policies: details.policies,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/shares/{share_id}/revoke",
    params(("share_id" = String, Path, description = "Share link identifier")),
    tag = "Shares",
    responses(
        (status = 204, description = "Share revoked"),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn revoke_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(share_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.shares.revoke_share(&actor, &share_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/shares/{share_id}/policies",
    params(("share_id" = String, Path, description = "Share link identifier")),
    tag = "Policies",
    responses(
        (status = 200, body = ListPoliciesResponse),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn list_share_policies(
    State(state): State<AppState>,
    actor: Actor,
    Path(share_id): Path<String>,
) -> Result<Json<ListPoliciesResponse>, ApiError> {
    let policies = state.shares.list_share_policies(&actor, &share_id).await?;
    Ok(Json(ListPoliciesResponse { policies }))
}

#[utoipa::path(
    post,
    path = "/v1/shares/{share_id}/policies",
    params(("share_id" = String, Path, description = "Share link identifier")),
    request_body = PolicyInput,
    tag = "Policies",
    responses(
        (status = 201, body = SharePolicy),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn create_share_policy(
    State(state): State<AppState>,
    actor: Actor,
    Path(share_id): Path<String>,
    Json(input): Json<PolicyInput>,
) -> Result<(StatusCode, Json<SharePolicy>), ApiError> {
    let policy = state
        .shares
        .create_share_policy(&actor, &share_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

#[utoipa::path(
    delete,
    path = "/v1/policies/{policy_id}",
    params(("policy_id" = String, Path, description = "Policy identifier")),
    tag = "Policies",
    responses(
        (status = 204, description = "Policy deleted"),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn delete_share_policy(
    State(state): State<AppState>,
    actor: Actor,
    Path(policy_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.shares.delete_share_policy(&actor, &policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
