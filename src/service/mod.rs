// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Services
//!
//! Business operations behind the HTTP surface:
//!
//! - [`ShareLifecycle`]: create, inspect, revoke and view one-time links,
//!   plus the per-link access policies
//! - [`TemplateService`]: tenant email templates for share notifications
//!
//! Every operation returns [`ShareError`]. Storage and upstream failures
//! are logged with full detail where they happen and collapsed into the
//! taxonomy below; the API layer maps each variant to a status code.

pub mod lifecycle;
pub mod templates;

pub use lifecycle::{CreatedShare, ShareDetails, ShareLifecycle, ViewedContent};
pub use templates::TemplateService;

/// Sender name used in notifications when the caller has no username.
pub const DEFAULT_SENDER_NAME: &str = "A user";

/// Authenticated caller of an admin operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub tenant_id: u32,
    pub user_id: Option<u32>,
    pub username: Option<String>,
}

impl Actor {
    pub fn new(tenant_id: u32) -> Self {
        Self {
            tenant_id,
            user_id: None,
            username: None,
        }
    }

    pub fn sender_name(&self) -> &str {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SENDER_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    #[error("{0}")]
    NotFound(String),

    #[error("this share has already been viewed")]
    AlreadyViewed,

    #[error("this share has been revoked")]
    Revoked,

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    Encryption(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ShareError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type ShareResult<T> = Result<T, ShareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_name_falls_back() {
        let mut actor = Actor::new(1);
        assert_eq!(actor.sender_name(), "A user");
        actor.username = Some("   ".to_string());
        assert_eq!(actor.sender_name(), "A user");
        actor.username = Some("alice".to_string());
        assert_eq!(actor.sender_name(), "alice");
    }
}
