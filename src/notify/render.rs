// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Handlebars rendering of share emails.
//!
//! Subjects are plain text and rendered without escaping; bodies are HTML
//! and every interpolated value is escaped. Both run in strict mode, so a
//! template referring to an unknown variable fails to render.

use handlebars::Handlebars;
use serde::Serialize;

/// Built-in subject used when no stored template applies.
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "{{sender_name}} shared a {{resource_type}} with you";

/// Built-in HTML body used when no stored template applies.
pub const DEFAULT_HTML_BODY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f5f5; margin: 0; padding: 20px; }
    .container { max-width: 600px; margin: 0 auto; background: #fff; border-radius: 8px; padding: 40px; }
    .message { background: #f8f9fa; border-left: 4px solid #4f46e5; padding: 15px; margin: 20px 0; }
    .btn { display: inline-block; background: #4f46e5; color: #fff; padding: 12px 30px; text-decoration: none; border-radius: 6px; font-weight: 600; }
    .warning { color: #dc2626; font-size: 13px; margin-top: 15px; }
  </style>
</head>
<body>
  <div class="container">
    <h1>Shared {{resource_type}}</h1>
    <p><strong>{{sender_name}}</strong> has shared a {{resource_type}} with you: <strong>{{resource_name}}</strong></p>
    {{#if message}}
    <div class="message"><p>{{message}}</p></div>
    {{/if}}
    <p style="text-align: center;"><a href="{{share_link}}" class="btn">View shared {{resource_type}}</a></p>
    <p class="warning">This link can only be viewed once. After viewing, the content will no longer be accessible.</p>
  </div>
</body>
</html>"#;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("subject template invalid: {0}")]
    Subject(String),

    #[error("body template invalid: {0}")]
    Body(String),
}

/// Variables available to share email templates.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TemplateData {
    pub sender_name: String,
    pub recipient_email: String,
    pub share_link: String,
    pub message: String,
    pub resource_name: String,
    pub resource_type: String,
}

impl TemplateData {
    /// Values used to validate and preview templates.
    pub fn sample() -> Self {
        Self {
            sender_name: "John Doe".to_string(),
            recipient_email: "recipient@example.com".to_string(),
            share_link: "https://example.com/#/shared/sample-token".to_string(),
            message: "Here is the information you requested.".to_string(),
            resource_name: "Sample Resource".to_string(),
            resource_type: "secret".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
}

pub struct EmailRenderer {
    subject: Handlebars<'static>,
    body: Handlebars<'static>,
}

impl EmailRenderer {
    pub fn new() -> Self {
        let mut subject = Handlebars::new();
        subject.register_escape_fn(handlebars::no_escape);
        subject.set_strict_mode(true);

        let mut body = Handlebars::new();
        body.set_strict_mode(true);

        Self { subject, body }
    }

    pub fn render(
        &self,
        subject_template: &str,
        body_template: &str,
        data: &TemplateData,
    ) -> Result<RenderedEmail, TemplateError> {
        let subject = self
            .subject
            .render_template(subject_template, data)
            .map_err(|e| TemplateError::Subject(e.to_string()))?;
        let html_body = self
            .body
            .render_template(body_template, data)
            .map_err(|e| TemplateError::Body(e.to_string()))?;
        Ok(RenderedEmail {
            subject: subject.trim().to_string(),
            html_body,
        })
    }

    pub fn render_default(&self, data: &TemplateData) -> Result<RenderedEmail, TemplateError> {
        self.render(DEFAULT_SUBJECT_TEMPLATE, DEFAULT_HTML_BODY_TEMPLATE, data)
    }
}

impl Default for EmailRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmailRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailRenderer").finish_non_exhaustive()
    }
}
