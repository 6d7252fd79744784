// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Lifecycle
//!
//! Orchestrates creation and one-time viewing of share links.
//!
//! ## Creating
//!
//! 1. Fetch display name, plaintext and MIME type from the provider
//!    registered for the resource kind.
//! 2. Seal the plaintext with AES-256-GCM.
//! 3. Persist the link under a fresh token (regenerated on collision).
//! 4. Persist any supplied policies; individual failures are logged and
//!    skipped.
//! 5. Dispatch the notification email in the background.
//!
//! ## Viewing
//!
//! ```text
//! lookup by token ─► revoked? ─► viewed? ─► policies ─► atomic consume ─► decrypt
//!        │              │           │           │              │
//!     NotFound       Revoked   AlreadyViewed AccessDenied  lost race:
//!                                                          AlreadyViewed / Revoked
//! ```
//!
//! Only the atomic consume in the store decides who sees the plaintext.
//! The earlier revoked/viewed checks are an early exit, not the guard.
//!
//! ## Shutdown
//!
//! Notification tasks run on a [`TaskTracker`] with their own
//! [`CancellationToken`], detached from the request that created them.
//! [`ShareLifecycle::shutdown`] lets them drain for a grace period, then
//! cancels whatever is left.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{Actor, ShareError, ShareResult};
use crate::crypto::{ContentCipher, TokenGenerator};
use crate::models::{CreateShareRequest, PolicyInput};
use crate::notify::{EmailRenderer, NotificationSender, NotifyError, TemplateData, TemplateError};
use crate::policy::{validate_value, Decision, PolicyEngine, RequestContext, SharePolicy};
use crate::providers::{ProviderRegistry, ResourceKind};
use crate::storage::{
    ConsumeOutcome, PageRequest, ShareLink, ShareLinkFilter, ShareStore, StoreError,
};

/// Attempts at persisting a link before a token collision becomes fatal.
pub const MAX_TOKEN_ATTEMPTS: usize = 3;

/// How long shutdown waits for pending notifications before cancelling them.
pub const NOTIFICATION_DRAIN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedShare {
    pub share_id: String,
    pub share_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareDetails {
    pub link: ShareLink,
    pub policies: Vec<SharePolicy>,
}

/// Plaintext released by a successful view.
#[derive(Clone, PartialEq, Eq)]
pub struct ViewedContent {
    pub resource_type: ResourceKind,
    pub resource_name: String,
    pub content: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for ViewedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewedContent")
            .field("resource_type", &self.resource_type)
            .field("resource_name", &self.resource_name)
            .field("content_len", &self.content.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

pub struct ShareLifecycle {
    store: Arc<dyn ShareStore>,
    providers: ProviderRegistry,
    cipher: ContentCipher,
    tokens: TokenGenerator,
    engine: PolicyEngine,
    notifier: Arc<dyn NotificationSender>,
    renderer: Arc<EmailRenderer>,
    app_host: String,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    notification_drain: Duration,
}

impl ShareLifecycle {
    pub fn new(
        store: Arc<dyn ShareStore>,
        providers: ProviderRegistry,
        cipher: ContentCipher,
        notifier: Arc<dyn NotificationSender>,
        app_host: impl Into<String>,
    ) -> Self {
        Self {
            store,
            providers,
            cipher,
            tokens: TokenGenerator::new(),
            engine: PolicyEngine::new(),
            notifier,
            renderer: Arc::new(EmailRenderer::new()),
            app_host: app_host.into().trim_end_matches('/').to_string(),
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            notification_drain: NOTIFICATION_DRAIN,
        }
    }

    pub fn with_notification_drain(mut self, drain: Duration) -> Self {
        self.notification_drain = drain;
        self
    }

    pub fn store(&self) -> &Arc<dyn ShareStore> {
        &self.store
    }

    pub fn renderer(&self) -> &EmailRenderer {
        &self.renderer
    }

    /// Deep link the recipient opens.
    pub fn share_url(&self, token: &str) -> String {
        format!("{}/#/shared/{}", self.app_host, token)
    }

    // =========================================================================
    // Shares
    // =========================================================================

    pub async fn create_share(
        &self,
        actor: &Actor,
        request: CreateShareRequest,
    ) -> ShareResult<CreatedShare> {
        let kind = ResourceKind::parse(&request.resource_type)
            .ok_or_else(|| ShareError::invalid("resource type must be SECRET or DOCUMENT"))?;
        let resource_id = request.resource_id.trim();
        if resource_id.is_empty() {
            return Err(ShareError::invalid("resource_id is required"));
        }
        let recipient = request.recipient_email.trim();
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(ShareError::invalid("recipient_email must be an email address"));
        }
        for policy in &request.policies {
            check_policy_input(policy)?;
        }
        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let template_id = match request.template_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(self.check_template_ref(actor, id).await?),
            _ => None,
        };

        let provider = self.providers.get(kind).ok_or_else(|| {
            ShareError::invalid(format!("{kind} shares are not enabled on this deployment"))
        })?;

        let fetched = provider
            .fetch(actor.tenant_id, resource_id)
            .await
            .map_err(|e| {
                error!(
                    tenant_id = actor.tenant_id,
                    resource_type = %kind,
                    resource_id = %resource_id,
                    error = %e,
                    "Failed to fetch resource for sharing"
                );
                ShareError::UpstreamUnavailable(format!("failed to fetch {kind}: {e}"))
            })?;

        let sealed = self.cipher.encrypt(&fetched.content).map_err(|e| {
            error!(error = %e, "Failed to encrypt share content");
            ShareError::Encryption("failed to encrypt content".to_string())
        })?;

        let mut link = ShareLink {
            id: Uuid::new_v4().to_string(),
            tenant_id: actor.tenant_id,
            resource_type: kind,
            resource_id: resource_id.to_string(),
            resource_name: fetched.display_name,
            token: String::new(),
            encrypted_content: sealed.ciphertext,
            encryption_nonce: sealed.nonce,
            mime_type: fetched.mime_type,
            recipient_email: recipient.to_string(),
            message,
            template_id,
            viewed: false,
            viewed_at: None,
            viewed_ip: None,
            revoked: false,
            created_by: actor.user_id,
            created_at: Utc::now(),
        };
        self.persist_with_fresh_token(&mut link).await?;

        for input in &request.policies {
            let policy = new_policy(actor, &link.id, input);
            if let Err(e) = self.store.insert_policy(&policy).await {
                warn!(
                    share_id = %link.id,
                    method = %policy.method,
                    error = %e,
                    "Failed to persist share policy; skipping"
                );
            }
        }

        let share_link = self.share_url(&link.token);

        info!(
            share_id = %link.id,
            tenant_id = link.tenant_id,
            resource_type = %link.resource_type,
            policies = request.policies.len(),
            "Share link created"
        );

        self.dispatch_notification(
            link.tenant_id,
            link.template_id.clone(),
            link.recipient_email.clone(),
            TemplateData {
                sender_name: actor.sender_name().to_string(),
                recipient_email: link.recipient_email.clone(),
                share_link: share_link.clone(),
                message: link.message.clone().unwrap_or_default(),
                resource_name: link.resource_name.clone(),
                resource_type: link.resource_type.as_str().to_ascii_lowercase(),
            },
        );

        Ok(CreatedShare {
            share_id: link.id,
            share_link,
        })
    }

    async fn persist_with_fresh_token(&self, link: &mut ShareLink) -> ShareResult<()> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            link.token = self.tokens.generate().map_err(|e| {
                error!(error = %e, "Failed to generate share token");
                ShareError::Encryption("failed to generate share token".to_string())
            })?;

            match self.store.insert_link(link).await {
                Ok(()) => return Ok(()),
                Err(StoreError::TokenConflict) => {
                    warn!(share_id = %link.id, attempt, "Share token collision; regenerating");
                }
                Err(e) => return Err(internal("create share link", e)),
            }
        }
        error!(
            share_id = %link.id,
            attempts = MAX_TOKEN_ATTEMPTS,
            "Gave up after repeated share token collisions"
        );
        Err(ShareError::Internal("failed to allocate a share token".to_string()))
    }

    async fn check_template_ref(&self, actor: &Actor, id: &str) -> ShareResult<String> {
        match self.store.get_template(id).await {
            Ok(Some(t)) if t.tenant_id == actor.tenant_id => Ok(t.id),
            Ok(_) => Err(ShareError::invalid(format!("email template {id} does not exist"))),
            Err(e) => Err(internal("load email template", e)),
        }
    }

    /// Load a link owned by the caller's tenant.
    async fn owned_link(&self, actor: &Actor, id: &str) -> ShareResult<ShareLink> {
        match self.store.get_link(id).await {
            Ok(Some(link)) if link.tenant_id == actor.tenant_id => Ok(link),
            Ok(_) => Err(ShareError::not_found("share not found")),
            Err(e) => Err(internal("get share link", e)),
        }
    }

    pub async fn get_share(&self, actor: &Actor, id: &str) -> ShareResult<ShareDetails> {
        let link = self.owned_link(actor, id).await?;
        let policies = self
            .store
            .list_policies(&link.id)
            .await
            .map_err(|e| internal("list share policies", e))?;
        Ok(ShareDetails { link, policies })
    }

    pub async fn list_shares(
        &self,
        actor: &Actor,
        filter: &ShareLinkFilter,
        page: PageRequest,
    ) -> ShareResult<(Vec<ShareLink>, usize)> {
        self.store
            .list_links(actor.tenant_id, filter, page)
            .await
            .map_err(|e| internal("list share links", e))
    }

    /// Revoke a link. Idempotent; no precondition on `viewed`.
    pub async fn revoke_share(&self, actor: &Actor, id: &str) -> ShareResult<()> {
        let link = self.owned_link(actor, id).await?;
        let found = self
            .store
            .revoke(&link.id)
            .await
            .map_err(|e| internal("revoke share link", e))?;
        if !found {
            return Err(ShareError::not_found("share not found"));
        }
        info!(
            share_id = %link.id,
            tenant_id = link.tenant_id,
            was_viewed = link.viewed,
            "Share link revoked"
        );
        Ok(())
    }

    /// Release the plaintext of a link exactly once.
    pub async fn view_shared_content(
        &self,
        token: &str,
        ctx: &RequestContext,
    ) -> ShareResult<ViewedContent> {
        let not_found = || ShareError::not_found("share not found or invalid token");

        if !TokenGenerator::is_well_formed(token) {
            return Err(not_found());
        }

        let link = self
            .store
            .get_link_by_token(token)
            .await
            .map_err(|e| internal("look up share by token", e))?
            .ok_or_else(not_found)?;

        if link.revoked {
            return Err(ShareError::Revoked);
        }
        if link.viewed {
            return Err(ShareError::AlreadyViewed);
        }

        let policies = self.store.list_policies(&link.id).await.unwrap_or_else(|e| {
            warn!(
                share_id = %link.id,
                error = %e,
                "Failed to load share policies; evaluating without them"
            );
            Vec::new()
        });

        if let Decision::Deny { reason } = self.engine.evaluate(&policies, ctx) {
            warn!(
                share_id = %link.id,
                tenant_id = link.tenant_id,
                client_ip = %ctx.client_ip,
                reason = %reason,
                "Share view denied by policy"
            );
            return Err(ShareError::AccessDenied(reason));
        }

        let consumed = match self
            .store
            .consume(&link.id, ctx.now, &ctx.client_ip)
            .await
            .map_err(|e| internal("consume share link", e))?
        {
            ConsumeOutcome::Consumed(consumed) => consumed,
            ConsumeOutcome::AlreadyViewed => {
                info!(share_id = %link.id, "Concurrent view won the race; share already viewed");
                return Err(ShareError::AlreadyViewed);
            }
            ConsumeOutcome::Revoked => {
                info!(share_id = %link.id, "Share revoked before it could be consumed");
                return Err(ShareError::Revoked);
            }
            ConsumeOutcome::NotFound => return Err(not_found()),
        };

        let content = self
            .cipher
            .decrypt(&consumed.encrypted_content, &consumed.encryption_nonce)
            .map_err(|e| {
                error!(
                    share_id = %consumed.id,
                    error = %e,
                    "Failed to decrypt consumed share; link stays consumed"
                );
                ShareError::Encryption("failed to decrypt content".to_string())
            })?;

        info!(
            share_id = %consumed.id,
            tenant_id = consumed.tenant_id,
            client_ip = %ctx.client_ip,
            "Share viewed"
        );

        Ok(ViewedContent {
            resource_type: consumed.resource_type,
            resource_name: consumed.resource_name,
            content,
            mime_type: consumed.mime_type,
        })
    }

    // =========================================================================
    // Policies
    // =========================================================================

    pub async fn create_share_policy(
        &self,
        actor: &Actor,
        share_id: &str,
        input: PolicyInput,
    ) -> ShareResult<SharePolicy> {
        let link = self.owned_link(actor, share_id).await?;
        check_policy_input(&input)?;

        let policy = new_policy(actor, &link.id, &input);
        self.store
            .insert_policy(&policy)
            .await
            .map_err(|e| internal("create share policy", e))?;

        info!(
            share_id = %link.id,
            policy_id = %policy.id,
            policy_type = ?policy.policy_type,
            method = %policy.method,
            "Share policy created"
        );
        Ok(policy)
    }

    pub async fn list_share_policies(
        &self,
        actor: &Actor,
        share_id: &str,
    ) -> ShareResult<Vec<SharePolicy>> {
        let link = self.owned_link(actor, share_id).await?;
        self.store
            .list_policies(&link.id)
            .await
            .map_err(|e| internal("list share policies", e))
    }

    pub async fn delete_share_policy(&self, actor: &Actor, policy_id: &str) -> ShareResult<()> {
        match self.store.get_policy(policy_id).await {
            Ok(Some(p)) if p.tenant_id == actor.tenant_id => {}
            Ok(_) => return Err(ShareError::not_found("policy not found")),
            Err(e) => return Err(internal("get share policy", e)),
        }
        let removed = self
            .store
            .delete_policy(policy_id)
            .await
            .map_err(|e| internal("delete share policy", e))?;
        if !removed {
            return Err(ShareError::not_found("policy not found"));
        }
        info!(policy_id = %policy_id, "Share policy deleted");
        Ok(())
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    fn dispatch_notification(
        &self,
        tenant_id: u32,
        template_id: Option<String>,
        recipient: String,
        data: TemplateData,
    ) {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let renderer = Arc::clone(&self.renderer);
        let cancel = self.shutdown.child_token();

        self.tasks.spawn(async move {
            let delivery = deliver(
                store.as_ref(),
                notifier.as_ref(),
                &renderer,
                tenant_id,
                template_id.as_deref(),
                &recipient,
                &data,
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(tenant_id, recipient = %recipient, "Share notification cancelled by shutdown");
                }
                result = delivery => match result {
                    Ok(()) => info!(tenant_id, recipient = %recipient, "Share notification sent"),
                    Err(e) => error!(
                        tenant_id,
                        recipient = %recipient,
                        error = %e,
                        "Failed to send share notification"
                    ),
                },
            }
        });
    }

    /// Wait for pending notifications, cancelling any still running after
    /// the grace period.
    pub async fn shutdown(&self) {
        self.tasks.close();
        if tokio::time::timeout(self.notification_drain, self.tasks.wait())
            .await
            .is_err()
        {
            warn!(
                pending = self.tasks.len(),
                "Cancelling share notifications still pending at shutdown"
            );
            self.shutdown.cancel();
            self.tasks.wait().await;
        }
    }
}

impl std::fmt::Debug for ShareLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareLifecycle")
            .field("providers", &self.providers)
            .field("app_host", &self.app_host)
            .field("pending_notifications", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Template selection: explicit id, then the tenant default, then built-in.
async fn deliver(
    store: &dyn ShareStore,
    notifier: &dyn NotificationSender,
    renderer: &EmailRenderer,
    tenant_id: u32,
    template_id: Option<&str>,
    recipient: &str,
    data: &TemplateData,
) -> Result<(), DispatchError> {
    let mut template = None;
    if let Some(id) = template_id {
        match store.get_template(id).await {
            Ok(Some(t)) if t.tenant_id == tenant_id => template = Some(t),
            Ok(_) => warn!(template_id = %id, "Share template missing; falling back"),
            Err(e) => warn!(template_id = %id, error = %e, "Failed to load share template"),
        }
    }
    if template.is_none() {
        match store.get_default_template(tenant_id).await {
            Ok(t) => template = t,
            Err(e) => warn!(tenant_id, error = %e, "Failed to load default share template"),
        }
    }

    let rendered = match template {
        Some(t) => renderer.render(&t.subject, &t.html_body, data)?,
        None => renderer.render_default(data)?,
    };
    notifier
        .send(recipient, &rendered.subject, &rendered.html_body)
        .await?;
    Ok(())
}

fn check_policy_input(input: &PolicyInput) -> ShareResult<()> {
    validate_value(input.method, &input.value)
        .map_err(|e| ShareError::invalid(format!("invalid {} policy value: {e}", input.method)))?;
    if !input.method.is_evaluable() {
        warn!(
            method = %input.method,
            "Accepting policy whose method cannot be evaluated from request context"
        );
    }
    Ok(())
}

fn new_policy(actor: &Actor, share_link_id: &str, input: &PolicyInput) -> SharePolicy {
    SharePolicy {
        id: Uuid::new_v4().to_string(),
        tenant_id: actor.tenant_id,
        share_link_id: share_link_id.to_string(),
        policy_type: input.policy_type,
        method: input.method,
        value: input.value.trim().to_string(),
        reason: input
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        created_by: actor.user_id,
        created_at: Utc::now(),
    }
}

fn internal(operation: &str, e: StoreError) -> ShareError {
    error!(operation, error = %e, "Storage operation failed");
    ShareError::Internal(format!("failed to {operation}"))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the lifecycle, template and API tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::crypto::EncryptionKey;
    use crate::providers::{FetchedResource, ProviderError, ResourceProvider};
    use crate::storage::MemoryShareStore;

    pub struct FakeProvider {
        pub kind: ResourceKind,
        pub content: Vec<u8>,
        pub fail: bool,
    }

    #[async_trait]
    impl ResourceProvider for FakeProvider {
        fn kind(&self) -> ResourceKind {
            self.kind
        }

        async fn fetch(&self, _: u32, id: &str) -> Result<FetchedResource, ProviderError> {
            if self.fail {
                return Err(ProviderError::Request("connection refused".to_string()));
            }
            Ok(FetchedResource {
                display_name: format!("{id} name"),
                content: self.content.clone(),
                mime_type: match self.kind {
                    ResourceKind::Secret => "text/plain; charset=utf-8".to_string(),
                    ResourceKind::Document => "application/pdf".to_string(),
                },
            })
        }
    }

    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    pub fn cipher() -> ContentCipher {
        ContentCipher::new(&EncryptionKey::from_bytes(&[42u8; 32]).unwrap()).unwrap()
    }

    pub fn registry() -> ProviderRegistry {
        ProviderRegistry::new()
            .with(Arc::new(FakeProvider {
                kind: ResourceKind::Secret,
                content: b"hunter2".to_vec(),
                fail: false,
            }))
            .with(Arc::new(FakeProvider {
                kind: ResourceKind::Document,
                content: vec![0x25, 0x50, 0x44, 0x46],
                fail: false,
            }))
    }

    pub fn lifecycle_with(
        store: Arc<dyn ShareStore>,
        providers: ProviderRegistry,
    ) -> (ShareLifecycle, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        let lifecycle = ShareLifecycle::new(
            store,
            providers,
            cipher(),
            sender.clone(),
            "https://app.example.com/",
        );
        (lifecycle, sender)
    }

    pub fn lifecycle() -> (ShareLifecycle, Arc<RecordingSender>) {
        lifecycle_with(Arc::new(MemoryShareStore::new()), registry())
    }

    pub fn actor() -> Actor {
        Actor {
            tenant_id: 1,
            user_id: Some(7),
            username: Some("alice".to_string()),
        }
    }

    pub fn secret_request() -> CreateShareRequest {
        CreateShareRequest {
            resource_type: "SECRET".to_string(),
            resource_id: "secret-1".to_string(),
            recipient_email: "bob@example.com".to_string(),
            message: Some("for the deploy".to_string()),
            template_id: None,
            policies: Vec::new(),
        }
    }

    pub fn token_of(share_link: &str) -> String {
        share_link.rsplit('/').next().unwrap_or_default().to_string()
    }
}
