// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted record types.
//!
//! These are the shapes written to the store. API responses are built from
//! them in `models` and never include the sealed payload or the token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::ResourceKind;

/// A one-time share link as stored.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareLink {
    /// Unique link identifier (UUID)
    pub id: String,
    pub tenant_id: u32,
    pub resource_type: ResourceKind,
    pub resource_id: String,
    /// Display name captured from the provider at creation
    pub resource_name: String,
    /// 64 lowercase hex chars, unique across all links
    pub token: String,
    /// AES-256-GCM ciphertext with appended tag
    #[serde(with = "base64_bytes")]
    pub encrypted_content: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub encryption_nonce: Vec<u8>,
    pub mime_type: String,
    pub recipient_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub viewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_ip: Option<String>,
    pub revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShareLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareLink")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("resource_type", &self.resource_type)
            .field("resource_id", &self.resource_id)
            .field("token", &"<redacted>")
            .field("payload_len", &self.encrypted_content.len())
            .field("viewed", &self.viewed)
            .field("revoked", &self.revoked)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Optional filters for listing links.
#[derive(Debug, Clone, Default)]
pub struct ShareLinkFilter {
    pub resource_type: Option<ResourceKind>,
    pub recipient_email: Option<String>,
}

impl ShareLinkFilter {
    pub fn matches(&self, link: &ShareLink) -> bool {
        if let Some(kind) = self.resource_type {
            if link.resource_type != kind {
                return false;
            }
        }
        match self.recipient_email.as_deref() {
            Some(email) if !email.is_empty() => link.recipient_email == email,
            _ => true,
        }
    }
}

/// Customisable notification email, one namespace per tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailTemplate {
    pub id: String,
    pub tenant_id: u32,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 1-based page selection. A zero page or page size disables paging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Slice an already ordered result set.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        if self.page == 0 || self.page_size == 0 {
            return items;
        }
        let offset = (self.page as usize - 1).saturating_mul(self.page_size as usize);
        items
            .into_iter()
            .skip(offset)
            .take(self.page_size as usize)
            .collect()
    }
}

mod base64_bytes {
    use base64ct::{Base64, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Base64::decode_vec(&encoded).map_err(serde::de::Error::custom)
    }
}
