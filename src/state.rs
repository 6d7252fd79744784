// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AppConfig, StoreBackend};
use crate::crypto::{CipherError, ContentCipher};
use crate::notify::{HttpRelaySender, LogOnlySender, NotificationSender, NotifyError};
use crate::providers::{
    DocumentStoreClient, ProviderError, ProviderRegistry, SecretVaultClient,
};
use crate::service::{ShareLifecycle, TemplateService};
use crate::storage::{MemoryShareStore, RedbShareStore, ShareStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cipher setup failed: {0}")]
    Cipher(#[from] CipherError),

    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("mail relay setup failed: {0}")]
    Notify(#[from] NotifyError),
}

#[derive(Clone)]
pub struct AppState {
    pub shares: Arc<ShareLifecycle>,
    pub templates: Arc<TemplateService>,
    /// Database directory checked by the readiness endpoint (redb backend only).
    pub data_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(shares: ShareLifecycle, data_dir: Option<PathBuf>) -> Self {
        let templates = TemplateService::new(Arc::clone(shares.store()));
        Self {
            shares: Arc::new(shares),
            templates: Arc::new(templates),
            data_dir,
        }
    }

    /// Wire the store, providers and notifier described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let cipher = ContentCipher::new(&config.encryption_key)?;

        let (store, data_dir): (Arc<dyn ShareStore>, Option<PathBuf>) = match config.store_backend
        {
            StoreBackend::Redb => {
                let path = config.database_path();
                info!(path = %path.display(), "Opening share database");
                (
                    Arc::new(RedbShareStore::open(&path)?),
                    Some(config.data_dir.clone()),
                )
            }
            StoreBackend::Memory => {
                warn!("Using in-memory share store; shares are lost on restart");
                (Arc::new(MemoryShareStore::new()), None)
            }
        };

        let mut providers = ProviderRegistry::new();
        if let Some(url) = &config.secrets_api_url {
            providers.register(Arc::new(SecretVaultClient::new(url)?));
        }
        if let Some(url) = &config.documents_api_url {
            providers.register(Arc::new(DocumentStoreClient::new(url)?));
        }
        if providers.kinds().is_empty() {
            warn!("No resource providers configured; share creation will be rejected");
        } else {
            info!(kinds = ?providers.kinds(), "Resource providers configured");
        }

        let notifier: Arc<dyn NotificationSender> = match &config.mail_relay_url {
            Some(url) => Arc::new(HttpRelaySender::new(url, config.mail_from.clone())?),
            None => {
                warn!("MAIL_RELAY_URL not set; share notifications will only be logged");
                Arc::new(LogOnlySender)
            }
        };

        let shares = ShareLifecycle::new(store, providers, cipher, notifier, &config.app_host);
        Ok(Self::new(shares, data_dir))
    }
}
