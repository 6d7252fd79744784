// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Notifications
//!
//! Rendering of the "someone shared something with you" email and its
//! delivery. Delivery is best-effort: the lifecycle dispatches it in the
//! background and only logs the outcome.
//!
//! | Sender | Used when |
//! |--------|-----------|
//! | [`HttpRelaySender`] | `MAIL_RELAY_URL` is configured |
//! | [`LogOnlySender`] | no relay configured (development, tests) |

pub mod render;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

pub use render::{EmailRenderer, RenderedEmail, TemplateData, TemplateError};

const RELAY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail relay configuration invalid: {0}")]
    Config(String),

    #[error("mail relay request failed: {0}")]
    Request(String),

    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
}

/// Delivers a rendered message to one recipient.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str)
        -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct HttpRelaySender {
    endpoint: Url,
    from: String,
    http: Client,
}

impl HttpRelaySender {
    pub fn new(endpoint: &str, from: impl Into<String>) -> Result<Self, NotifyError> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| NotifyError::Config(format!("invalid relay URL {endpoint:?}: {e}")))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint,
            from: from.into(),
            http,
        })
    }
}

#[async_trait]
impl NotificationSender for HttpRelaySender {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), NotifyError> {
        let message = RelayMessage {
            from: &self.from,
            to: recipient,
            subject,
            html_body,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Records the send in the log and drops the message.
#[derive(Debug, Clone, Default)]
pub struct LogOnlySender;

#[async_trait]
impl NotificationSender for LogOnlySender {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), NotifyError> {
        info!(
            recipient = %recipient,
            subject = %subject,
            body_len = html_body.len(),
            "No mail relay configured; share notification not delivered"
        );
        Ok(())
    }
}
