// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    models::{
        CreateShareRequest, CreateShareResponse, CreateTemplateRequest, ListPoliciesResponse,
        ListSharesResponse, ListTemplatesResponse, PolicyInput, PreviewTemplateRequest,
        PreviewTemplateResponse, ShareDetailsResponse, ShareLinkResponse, SharedContentResponse,
        TemplateResponse, UpdateTemplateRequest,
    },
    policy::{PolicyMethod, PolicyType, SharePolicy},
    providers::ResourceKind,
    state::AppState,
};

pub mod health;
pub mod identity;
pub mod public;
pub mod shares;
pub mod templates;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/shares",
            get(shares::list_shares).post(shares::create_share),
        )
        .route("/shares/{share_id}", get(shares::get_share))
        .route("/shares/{share_id}/revoke", post(shares::revoke_share))
        .route(
            "/shares/{share_id}/policies",
            get(shares::list_share_policies).post(shares::create_share_policy),
        )
        .route("/policies/{policy_id}", delete(shares::delete_share_policy))
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route("/templates/preview", post(templates::preview_template))
        .route(
            "/templates/{template_id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/api/v1/shared/{token}", get(public::view_shared))
        .route(
            "/api/v1/shared/{token}/download",
            get(public::download_shared),
        )
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(public_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        shares::create_share,
        shares::list_shares,
        shares::get_share,
        shares::revoke_share,
        shares::list_share_policies,
        shares::create_share_policy,
        shares::delete_share_policy,
        templates::create_template,
        templates::list_templates,
        templates::get_template,
        templates::update_template,
        templates::delete_template,
        templates::preview_template,
        public::view_shared,
        public::download_shared,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ErrorBody,
            ResourceKind,
            PolicyType,
            PolicyMethod,
            SharePolicy,
            PolicyInput,
            CreateShareRequest,
            CreateShareResponse,
            ShareLinkResponse,
            ShareDetailsResponse,
            ListSharesResponse,
            ListPoliciesResponse,
            SharedContentResponse,
            CreateTemplateRequest,
            UpdateTemplateRequest,
            TemplateResponse,
            ListTemplatesResponse,
            PreviewTemplateRequest,
            PreviewTemplateResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::CheckStatus
        )
    ),
    tags(
        (name = "Shares", description = "One-time share link management"),
        (name = "Policies", description = "Access restrictions on share links"),
        (name = "Templates", description = "Tenant notification email templates"),
        (name = "Public", description = "Opening a share link"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
