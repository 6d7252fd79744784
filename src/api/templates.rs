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
        CreateTemplateRequest, ListTemplatesQuery, ListTemplatesResponse, PreviewTemplateRequest,
        PreviewTemplateResponse, TemplateResponse, UpdateTemplateRequest,
    },
    service::Actor,
    state::AppState,
    storage::PageRequest,
};

#[utoipa::path(
    post,
    path = "/v1/templates",
    request_body = CreateTemplateRequest,
    tag = "Templates",
    responses(
        (status = 201, body = TemplateResponse),
        (status = 400, body = ErrorBody),
        (status = 409, description = "Name already used by this tenant", body = ErrorBody)
    )
)]
pub async fn create_template(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), ApiError> {
    let template = state.templates.create_template(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(template.into())))
}

#[utoipa::path(
    get,
    path = "/v1/templates",
    params(ListTemplatesQuery),
    tag = "Templates",
    responses((status = 200, body = ListTemplatesResponse))
)]
pub async fn list_templates(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<ListTemplatesResponse>, ApiError> {
    let page = PageRequest::new(query.page.unwrap_or(0), query.page_size.unwrap_or(0));
    let (templates, total) = state.templates.list_templates(&actor, page).await?;
    Ok(Json(ListTemplatesResponse {
        templates: templates.into_iter().map(TemplateResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/templates/{template_id}",
    params(("template_id" = String, Path, description = "Template identifier")),
    tag = "Templates",
    responses(
        (status = 200, body = TemplateResponse),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_template(
    State(state): State<AppState>,
    actor: Actor,
    Path(template_id): Path<String>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = state.templates.get_template(&actor, &template_id).await?;
    Ok(Json(template.into()))
}

#[utoipa::path(
    put,
    path = "/v1/templates/{template_id}",
    params(("template_id" = String, Path, description = "Template identifier")),
    request_body = UpdateTemplateRequest,
    tag = "Templates",
    responses(
        (status = 200, body = TemplateResponse),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn update_template(
    State(state): State<AppState>,
    actor: Actor,
    Path(template_id): Path<String>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = state
        .templates
        .update_template(&actor, &template_id, request)
        .await?;
    Ok(Json(template.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/templates/{template_id}",
    params(("template_id" = String, Path, description = "Template identifier")),
    tag = "Templates",
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn delete_template(
    State(state): State<AppState>,
    actor: Actor,
    Path(template_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.templates.delete_template(&actor, &template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Render a draft template with sample data without saving it.
#[utoipa::path(
    post,
    path = "/v1/templates/preview",
    request_body = PreviewTemplateRequest,
    tag = "Templates",
    responses(
        (status = 200, body = PreviewTemplateResponse),
        (status = 400, body = ErrorBody)
    )
)]
pub async fn preview_template(
    State(state): State<AppState>,
    _actor: Actor,
    Json(request): Json<PreviewTemplateRequest>,
) -> Result<Json<PreviewTemplateResponse>, ApiError> {
    let rendered = state.templates.preview_template(&request)?;
    Ok(Json(PreviewTemplateResponse {
        subject: rendered.subject,
        html_body: rendered.html_body,
    }))
}
