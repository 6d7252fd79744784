// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tenant email templates for share notifications.
//!
//! A template is accepted only if both its subject and body render against
//! sample data. Names are unique per tenant and at most one template per
//! tenant is the default.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use super::{Actor, ShareError, ShareResult};
use crate::models::{CreateTemplateRequest, PreviewTemplateRequest, UpdateTemplateRequest};
use crate::notify::{EmailRenderer, RenderedEmail, TemplateData};
use crate::storage::{EmailTemplate, PageRequest, ShareStore, StoreError};

pub struct TemplateService {
    store: Arc<dyn ShareStore>,
    renderer: EmailRenderer,
}

impl TemplateService {
    pub fn new(store: Arc<dyn ShareStore>) -> Self {
        Self {
            store,
            renderer: EmailRenderer::new(),
        }
    }

    fn validate(&self, subject: &str, html_body: &str) -> ShareResult<RenderedEmail> {
        self.renderer
            .render(subject, html_body, &TemplateData::sample())
            .map_err(|e| ShareError::invalid(e.to_string()))
    }

    pub async fn create_template(
        &self,
        actor: &Actor,
        request: CreateTemplateRequest,
    ) -> ShareResult<EmailTemplate> {
        let name = required("name", &request.name)?;
        required("subject", &request.subject)?;
        required("html_body", &request.html_body)?;
        self.validate(&request.subject, &request.html_body)?;

        let now = Utc::now();
        let template = EmailTemplate {
            id: Uuid::new_v4().to_string(),
            tenant_id: actor.tenant_id,
            name,
            subject: request.subject,
            html_body: request.html_body,
            is_default: request.is_default,
            created_by: actor.user_id,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert_template(&template)
            .await
            .map_err(|e| map_store_error("create email template", e))?;

        info!(
            template_id = %template.id,
            tenant_id = template.tenant_id,
            is_default = template.is_default,
            "Email template created"
        );
        Ok(template)
    }

    pub async fn get_template(&self, actor: &Actor, id: &str) -> ShareResult<EmailTemplate> {
        match self.store.get_template(id).await {
            Ok(Some(t)) if t.tenant_id == actor.tenant_id => Ok(t),
            Ok(_) => Err(ShareError::not_found("template not found")),
            Err(e) => Err(map_store_error("get email template", e)),
        }
    }

    pub async fn list_templates(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> ShareResult<(Vec<EmailTemplate>, usize)> {
        self.store
            .list_templates(actor.tenant_id, page)
            .await
            .map_err(|e| map_store_error("list email templates", e))
    }

    pub async fn update_template(
        &self,
        actor: &Actor,
        id: &str,
        request: UpdateTemplateRequest,
    ) -> ShareResult<EmailTemplate> {
        let mut template = self.get_template(actor, id).await?;

        if let Some(name) = request.name {
            template.name = required("name", &name)?;
        }
        let content_changed = request.subject.is_some() || request.html_body.is_some();
        if let Some(subject) = request.subject {
            required("subject", &subject)?;
            template.subject = subject;
        }
        if let Some(html_body) = request.html_body {
            required("html_body", &html_body)?;
            template.html_body = html_body;
        }
        if content_changed {
            self.validate(&template.subject, &template.html_body)?;
        }
        if let Some(is_default) = request.is_default {
            template.is_default = is_default;
        }
        template.updated_by = actor.user_id;
        template.updated_at = Utc::now();

        let found = self
            .store
            .update_template(&template)
            .await
            .map_err(|e| map_store_error("update email template", e))?;
        if !found {
            return Err(ShareError::not_found("template not found"));
        }

        info!(template_id = %template.id, "Email template updated");
        Ok(template)
    }

    pub async fn delete_template(&self, actor: &Actor, id: &str) -> ShareResult<()> {
        let template = self.get_template(actor, id).await?;
        let removed = self
            .store
            .delete_template(&template.id)
            .await
            .map_err(|e| map_store_error("delete email template", e))?;
        if !removed {
            return Err(ShareError::not_found("template not found"));
        }
        info!(template_id = %template.id, "Email template deleted");
        Ok(())
    }

    /// Render a candidate template against sample data. Nothing is stored.
    pub fn preview_template(&self, request: &PreviewTemplateRequest) -> ShareResult<RenderedEmail> {
        self.validate(&request.subject, &request.html_body)
    }
}

fn required(field: &str, value: &str) -> ShareResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ShareError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn map_store_error(operation: &str, e: StoreError) -> ShareError {
    match e {
        StoreError::TemplateNameTaken(name) => {
            ShareError::Conflict(format!("a template named {name:?} already exists"))
        }
        e => {
            error!(operation, error = %e, "Storage operation failed");
            ShareError::Internal(format!("failed to {operation}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryShareStore;

    fn service() -> TemplateService {
        TemplateService::new(Arc::new(MemoryShareStore::new()))
    }

    fn actor() -> Actor {
        Actor {
            tenant_id: 1,
            user_id: Some(7),
            username: None,
        }
    }

    fn request(name: &str, is_default: bool) -> CreateTemplateRequest {
        CreateTemplateRequest {
            name: name.to_string(),
            subject: "{{sender_name}} sent you {{resource_name}}".to_string(),
            html_body: "<p>{{message}}</p><a href=\"{{share_link}}\">open</a>".to_string(),
            is_default,
        }
    }

    #[tokio::test]
    async fn create_get_list_delete() {
        let svc = service();
        let created = svc
            .create_template(&actor(), request("welcome", true))
            .await
            .unwrap();
        assert_eq!(created.created_by, Some(7));
        assert!(created.is_default);

        assert_eq!(svc.get_template(&actor(), &created.id).await.unwrap(), created);
        assert!(matches!(
            svc.get_template(&Actor::new(2), &created.id).await,
            Err(ShareError::NotFound(_))
        ));

        let (listed, total) = svc
            .list_templates(&actor(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(listed[0].id, created.id);

        svc.delete_template(&actor(), &created.id).await.unwrap();
        assert!(matches!(
            svc.delete_template(&actor(), &created.id).await,
            Err(ShareError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_templates_are_rejected() {
        let svc = service();
        let mut bad = request("broken", false);
        bad.html_body = "{{#if message}}unterminated".to_string();
        assert!(matches!(
            svc.create_template(&actor(), bad).await,
            Err(ShareError::InvalidInput(_))
        ));

        let mut unknown = request("unknown", false);
        unknown.subject = "{{password}}".to_string();
        assert!(matches!(
            svc.create_template(&actor(), unknown).await,
            Err(ShareError::InvalidInput(_))
        ));

        assert!(matches!(
            svc.create_template(&actor(), request("  ", false)).await,
            Err(ShareError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let svc = service();
        svc.create_template(&actor(), request("welcome", false))
            .await
            .unwrap();
        assert!(matches!(
            svc.create_template(&actor(), request("welcome", false)).await,
            Err(ShareError::Conflict(_))
        ));
        // Other tenants have their own namespace.
        svc.create_template(&Actor::new(2), request("welcome", false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_is_partial_and_revalidated() {
        let svc = service();
        let first = svc
            .create_template(&actor(), request("first", true))
            .await
            .unwrap();
        let second = svc
            .create_template(&actor(), request("second", false))
            .await
            .unwrap();

        let updated = svc
            .update_template(
                &actor(),
                &second.id,
                UpdateTemplateRequest {
                    is_default: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_default);
        assert_eq!(updated.subject, second.subject);
        assert_eq!(updated.updated_by, Some(7));
        assert!(!svc.get_template(&actor(), &first.id).await.unwrap().is_default);

        assert!(matches!(
            svc.update_template(
                &actor(),
                &second.id,
                UpdateTemplateRequest {
                    html_body: Some("{{/if}}".to_string()),
                    ..Default::default()
                },
            )
            .await,
            Err(ShareError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.update_template(
                &actor(),
                &second.id,
                UpdateTemplateRequest {
                    name: Some("first".to_string()),
                    ..Default::default()
                },
            )
            .await,
            Err(ShareError::Conflict(_))
        ));
        assert!(matches!(
            svc.update_template(&actor(), "missing", UpdateTemplateRequest::default())
                .await,
            Err(ShareError::NotFound(_))
        ));
    }

    #[test]
    fn preview_renders_sample_data() {
        let rendered = service()
            .preview_template(&PreviewTemplateRequest {
                subject: "Hi {{recipient_email}}".to_string(),
                html_body: "<b>{{sender_name}}</b>".to_string(),
            })
            .unwrap();
        assert_eq!(rendered.subject, "Hi recipient@example.com");
        assert_eq!(rendered.html_body, "<b>John Doe</b>");
    }
}
