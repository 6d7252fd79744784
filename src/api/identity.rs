// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request identity extractors.
//!
//! Admin routes sit behind the gateway, which authenticates the caller and
//! forwards who they are in headers:
//!
//! | Header | Meaning | Required |
//! |--------|---------|----------|
//! | `x-tenant-id` | numeric tenant | yes |
//! | `x-user-id` | numeric user | no |
//! | `x-username` | display name used as notification sender | no |
//!
//! Public routes only need the viewer's address, taken from `X-Real-IP`,
//! then the first `X-Forwarded-For` hop, then the socket peer.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ErrorBody;
use crate::service::Actor;

pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USERNAME_HEADER: &str = "x-username";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    MissingTenant,
    InvalidHeader(&'static str),
}

impl IdentityError {
    pub fn error_code(&self) -> &'static str {
        match self {
            IdentityError::MissingTenant => "missing_tenant",
            IdentityError::InvalidHeader(_) => "invalid_identity_header",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::MissingTenant => StatusCode::UNAUTHORIZED,
            IdentityError::InvalidHeader(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::MissingTenant => write!(f, "{TENANT_ID_HEADER} header is required"),
            IdentityError::InvalidHeader(name) => write!(f, "{name} header is invalid"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, IdentityError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| IdentityError::InvalidHeader(name))?
                .trim();
            Ok((!value.is_empty()).then_some(value))
        }
    }
}

fn parse_u32(raw: &str, name: &'static str) -> Result<u32, IdentityError> {
    raw.parse().map_err(|_| IdentityError::InvalidHeader(name))
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, IdentityError> {
    let tenant_id = header_str(headers, TENANT_ID_HEADER)?
        .ok_or(IdentityError::MissingTenant)
        .and_then(|raw| parse_u32(raw, TENANT_ID_HEADER))?;
    let user_id = header_str(headers, USER_ID_HEADER)?
        .map(|raw| parse_u32(raw, USER_ID_HEADER))
        .transpose()?;
    let username = header_str(headers, USERNAME_HEADER)?.map(str::to_string);

    Ok(Actor {
        tenant_id,
        user_id,
        username,
    })
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = IdentityError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}

/// Address of the viewer as seen through the proxy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

fn first_hop(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(name)?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    first_hop(headers, REAL_IP_HEADER)
        .or_else(|| first_hop(headers, FORWARDED_FOR_HEADER))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}
