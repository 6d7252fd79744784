// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Resource Providers
//!
//! A share wraps a resource owned by another service. Each [`ResourceKind`]
//! is served by one [`ResourceProvider`] that returns the display name, the
//! plaintext and its MIME type. The lifecycle never branches on the kind; it
//! looks the provider up in a [`ProviderRegistry`].
//!
//! | Kind | Adapter | Upstream |
//! |------|---------|----------|
//! | `SECRET` | [`SecretVaultClient`] | secret vault HTTP API (`SECRETS_API_URL`) |
//! | `DOCUMENT` | [`DocumentStoreClient`] | document store HTTP API (`DOCUMENTS_API_URL`) |

pub mod documents;
pub mod secrets;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

pub use documents::{DocumentStoreClient, DEFAULT_DOCUMENT_MIME_TYPE};
pub use secrets::SecretVaultClient;

/// Header carrying the tenant on upstream calls.
pub const TENANT_HEADER: &str = "x-md-global-tenant-id";

/// Upstream request timeout.
pub const UPSTREAM_TIMEOUT_SECS: u64 = 15;

/// Kind of resource behind a share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Secret,
    Document,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Secret => "SECRET",
            ResourceKind::Document => "DOCUMENT",
        }
    }

    /// Parse a client-supplied kind (case-insensitive, optional
    /// `RESOURCE_TYPE_` prefix). Unknown or unspecified kinds yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();
        match upper.strip_prefix("RESOURCE_TYPE_").unwrap_or(&upper) {
            "SECRET" => Some(ResourceKind::Secret),
            "DOCUMENT" => Some(ResourceKind::Document),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a provider hands back for sharing.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub display_name: String,
    pub content: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for FetchedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedResource")
            .field("display_name", &self.display_name)
            .field("content_len", &self.content.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider configuration invalid: {0}")]
    Config(String),

    #[error("upstream request failed: {0}")]
    Request(String),

    #[error("upstream returned status {status} for {what}")]
    Status { status: u16, what: String },

    #[error("upstream response was invalid: {0}")]
    InvalidResponse(String),
}

/// Uniform fetch capability, one implementation per [`ResourceKind`].
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn fetch(&self, tenant_id: u32, resource_id: &str)
        -> Result<FetchedResource, ProviderError>;
}

/// Providers keyed by the kind they serve.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ResourceKind, Arc<dyn ResourceProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one for the same kind.
    pub fn register(&mut self, provider: Arc<dyn ResourceProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, kind: ResourceKind) -> Option<Arc<dyn ResourceProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Parse an upstream base URL from configuration.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ProviderError::Config(format!("invalid base URL {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ProviderError::Config(format!("{raw:?} cannot be a base URL")));
    }
    Ok(url)
}

/// Append path segments (percent-encoded) to a base URL.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ProviderError::Config(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
