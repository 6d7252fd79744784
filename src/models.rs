// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `ToSchema` for the OpenAPI document.
//!
//! Admin payloads use snake_case. The public viewing endpoints answer in
//! camelCase, which is what the share viewer frontend reads.
//!
//! Sealed payloads and share tokens never appear in any response here; the
//! token only leaves the service inside the deep link returned on creation.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::policy::{PolicyMethod, PolicyType, SharePolicy};
use crate::providers::ResourceKind;
use crate::service::ViewedContent;
use crate::storage::{EmailTemplate, ShareLink};

// =============================================================================
// Shares
// =============================================================================

/// Access restriction supplied with a share or added afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PolicyInput {
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub method: PolicyMethod,
    /// IP address, CIDR range or `HH:MM-HH:MM` UTC window depending on method.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreateShareRequest {
    /// `SECRET` or `DOCUMENT` (a `RESOURCE_TYPE_` prefix is accepted).
    pub resource_type: String,
    pub resource_id: String,
    pub recipient_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Email template to notify with; the tenant default applies if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default)]
    pub policies: Vec<PolicyInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreateShareResponse {
    pub share_id: String,
    /// Deep link for the recipient. Contains the one-time token.
    pub share_link: String,
}

/// Share link metadata. Never carries the payload or the token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ShareLinkResponse {
    pub id: String,
    pub tenant_id: u32,
    pub resource_type: ResourceKind,
    pub resource_id: String,
    pub resource_name: String,
    pub mime_type: String,
    pub recipient_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub viewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_ip: Option<String>,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl From<&ShareLink> for ShareLinkResponse {
    fn from(link: &ShareLink) -> Self {
        Self {
            id: link.id.clone(),
            tenant_id: link.tenant_id,
            resource_type: link.resource_type,
            resource_id: link.resource_id.clone(),
            resource_name: link.resource_name.clone(),
            mime_type: link.mime_type.clone(),
            recipient_email: link.recipient_email.clone(),
            message: link.message.clone(),
            template_id: link.template_id.clone(),
            viewed: link.viewed,
            viewed_at: link.viewed_at,
            viewed_ip: link.viewed_ip.clone(),
            revoked: link.revoked,
            created_by: link.created_by,
            created_at: link.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ShareDetailsResponse {
    pub share: ShareLinkResponse,
    pub policies: Vec<SharePolicy>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSharesQuery {
    /// Filter by `SECRET` or `DOCUMENT`.
    pub resource_type: Option<String>,
    pub recipient_email: Option<String>,
    /// 1-based page; 0 or absent returns everything.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ListSharesResponse {
    pub items: Vec<ShareLinkResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ListPoliciesResponse {
    pub policies: Vec<SharePolicy>,
}

// =============================================================================
// Public viewing
// =============================================================================

/// Result of opening a share link.
///
/// Secrets fill `password`; documents fill `fileName` and `fileContent`
/// (base64).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharedContentResponse {
    pub resource_type: ResourceKind,
    pub resource_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
}

impl From<&ViewedContent> for SharedContentResponse {
    fn from(viewed: &ViewedContent) -> Self {
        match viewed.resource_type {
            ResourceKind::Secret => Self {
                resource_type: viewed.resource_type,
                resource_name: viewed.resource_name.clone(),
                password: Some(String::from_utf8_lossy(&viewed.content).into_owned()),
                file_name: None,
                mime_type: viewed.mime_type.clone(),
                file_content: None,
            },
            ResourceKind::Document => Self {
                resource_type: viewed.resource_type,
                resource_name: viewed.resource_name.clone(),
                password: None,
                file_name: Some(viewed.resource_name.clone()),
                mime_type: viewed.mime_type.clone(),
                file_content: Some(Base64::encode_string(&viewed.content)),
            },
        }
    }
}

// =============================================================================
// Email templates
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreateTemplateRequest {
    pub name: String,
    /// Handlebars subject, e.g. `{{sender_name}} shared a {{resource_type}} with you`.
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TemplateResponse {
    pub id: String,
    pub tenant_id: u32,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmailTemplate> for TemplateResponse {
    fn from(t: EmailTemplate) -> Self {
        Self {
            id: t.id,
            tenant_id: t.tenant_id,
            name: t.name,
            subject: t.subject,
            html_body: t.html_body,
            is_default: t.is_default,
            created_by: t.created_by,
            updated_by: t.updated_by,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTemplatesQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ListTemplatesResponse {
    pub templates: Vec<TemplateResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PreviewTemplateRequest {
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PreviewTemplateResponse {
    pub subject: String,
    pub html_body: String,
}
