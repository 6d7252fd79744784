// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Document store adapter.
//!
//! Reads document metadata as JSON, then downloads the raw file. The MIME
//! type comes from the download's `Content-Type`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use url::Url;

use super::{
    endpoint, parse_base_url, FetchedResource, ProviderError, ResourceKind, ResourceProvider,
    TENANT_HEADER, UPSTREAM_TIMEOUT_SECS,
};

pub const DEFAULT_DOCUMENT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
struct DocumentMetadata {
    name: String,
}

#[derive(Debug, Clone)]
pub struct DocumentStoreClient {
    base_url: Url,
    http: Client,
}

impl DocumentStoreClient {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            http,
        })
    }

    async fn get(
        &self,
        tenant_id: u32,
        url: Url,
        what: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .http
            .get(url)
            .header(TENANT_HEADER, tenant_id.to_string())
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("{what}: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
                what: what.to_string(),
            });
        }
        Ok(response)
    }
}

/// Strip parameters we do not carry forward and fall back to octet-stream.
fn normalize_mime(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_DOCUMENT_MIME_TYPE.to_string())
}

#[async_trait]
impl ResourceProvider for DocumentStoreClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Document
    }

    async fn fetch(
        &self,
        tenant_id: u32,
        resource_id: &str,
    ) -> Result<FetchedResource, ProviderError> {
        let meta: DocumentMetadata = self
            .get(
                tenant_id,
                endpoint(&self.base_url, &["v1", "documents", resource_id])?,
                "document metadata",
            )
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("document metadata: {e}")))?;

        let download = self
            .get(
                tenant_id,
                endpoint(&self.base_url, &["v1", "documents", resource_id, "download"])?,
                "document download",
            )
            .await?;

        let mime_type = normalize_mime(
            download
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let content = download
            .bytes()
            .await
            .map_err(|e| ProviderError::Request(format!("document download: {e}")))?;

        Ok(FetchedResource {
            display_name: meta.name,
            content: content.to_vec(),
            mime_type,
        })
    }
}
