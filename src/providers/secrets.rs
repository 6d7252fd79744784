// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret vault adapter.
//!
//! Resolves a secret's display name and current password from the vault's
//! HTTP API. The password is shared as UTF-8 text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{
    endpoint, parse_base_url, FetchedResource, ProviderError, ResourceKind, ResourceProvider,
    TENANT_HEADER, UPSTREAM_TIMEOUT_SECS,
};

const SECRET_MIME_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Deserialize)]
struct SecretMetadata {
    name: String,
}

#[derive(Deserialize)]
struct SecretPassword {
    password: String,
}

#[derive(Debug, Clone)]
pub struct SecretVaultClient {
    base_url: Url,
    http: Client,
}

impl SecretVaultClient {
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

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        tenant_id: u32,
        url: Url,
        what: &str,
    ) -> Result<T, ProviderError> {
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

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{what}: {e}")))
    }
}

#[async_trait]
impl ResourceProvider for SecretVaultClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Secret
    }

    async fn fetch(
        &self,
        tenant_id: u32,
        resource_id: &str,
    ) -> Result<FetchedResource, ProviderError> {
        let meta: SecretMetadata = self
            .get_json(
                tenant_id,
                endpoint(&self.base_url, &["v1", "secrets", resource_id])?,
                "secret metadata",
            )
            .await?;

        let secret: SecretPassword = self
            .get_json(
                tenant_id,
                endpoint(&self.base_url, &["v1", "secrets", resource_id, "password"])?,
                "secret password",
            )
            .await?;

        Ok(FetchedResource {
            display_name: meta.name,
            content: secret.password.into_bytes(),
            mime_type: SECRET_MIME_TYPE.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            SecretVaultClient::new("::not a url::"),
            Err(ProviderError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_vault_is_a_request_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let client = SecretVaultClient::new("http://127.0.0.1:9/").unwrap();
        let err = client.fetch(1, "secret-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
    }
}
