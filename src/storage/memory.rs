// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory [`ShareStore`].
//!
//! Everything lives behind a single mutex, so each trait call is atomic with
//! respect to every other. Data is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    ConsumeOutcome, EmailTemplate, PageRequest, ShareLink, ShareLinkFilter, ShareStore,
    StoreError, StoreResult,
};
use crate::policy::SharePolicy;

#[derive(Default)]
struct Inner {
    links: HashMap<String, ShareLink>,
    tokens: HashMap<String, String>,
    policies: HashMap<String, SharePolicy>,
    templates: HashMap<String, EmailTemplate>,
}

impl Inner {
    fn check_template_name(&self, template: &EmailTemplate) -> StoreResult<()> {
        let taken = self.templates.values().any(|t| {
            t.tenant_id == template.tenant_id && t.name == template.name && t.id != template.id
        });
        if taken {
            return Err(StoreError::TemplateNameTaken(template.name.clone()));
        }
        Ok(())
    }

    fn clear_default(&mut self, tenant_id: u32, except: &str) {
        for t in self.templates.values_mut() {
            if t.tenant_id == tenant_id && t.id != except {
                t.is_default = false;
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryShareStore {
    inner: Mutex<Inner>,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn insert_link(&self, link: &ShareLink) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.tokens.contains_key(&link.token) {
            return Err(StoreError::TokenConflict);
        }
        if inner.links.contains_key(&link.id) {
            return Err(StoreError::DuplicateId(link.id.clone()));
        }
        inner.tokens.insert(link.token.clone(), link.id.clone());
        inner.links.insert(link.id.clone(), link.clone());
        Ok(())
    }

    async fn get_link(&self, id: &str) -> StoreResult<Option<ShareLink>> {
        Ok(self.inner.lock().await.links.get(id).cloned())
    }

    async fn get_link_by_token(&self, token: &str) -> StoreResult<Option<ShareLink>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tokens
            .get(token)
            .and_then(|id| inner.links.get(id))
            .cloned())
    }

    async fn list_links(
        &self,
        tenant_id: u32,
        filter: &ShareLinkFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<ShareLink>, usize)> {
        let inner = self.inner.lock().await;
        let mut links: Vec<ShareLink> = inner
            .links
            .values()
            .filter(|l| l.tenant_id == tenant_id && filter.matches(l))
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let total = links.len();
        Ok((page.apply(links), total))
    }

    async fn consume(
        &self,
        id: &str,
        viewed_at: DateTime<Utc>,
        viewed_ip: &str,
    ) -> StoreResult<ConsumeOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(link) = inner.links.get_mut(id) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if link.revoked {
            return Ok(ConsumeOutcome::Revoked);
        }
        if link.viewed {
            return Ok(ConsumeOutcome::AlreadyViewed);
        }
        link.viewed = true;
        link.viewed_at = Some(viewed_at);
        link.viewed_ip = Some(viewed_ip.to_string());
        Ok(ConsumeOutcome::Consumed(link.clone()))
    }

    async fn revoke(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.links.get_mut(id) {
            Some(link) => {
                link.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_policy(&self, policy: &SharePolicy) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.policies.contains_key(&policy.id) {
            return Err(StoreError::DuplicateId(policy.id.clone()));
        }
        inner.policies.insert(policy.id.clone(), policy.clone());
        Ok(())
    }

    async fn get_policy(&self, id: &str) -> StoreResult<Option<SharePolicy>> {
        Ok(self.inner.lock().await.policies.get(id).cloned())
    }

    async fn list_policies(&self, share_link_id: &str) -> StoreResult<Vec<SharePolicy>> {
        let inner = self.inner.lock().await;
        let mut policies: Vec<SharePolicy> = inner
            .policies
            .values()
            .filter(|p| p.share_link_id == share_link_id)
            .cloned()
            .collect();
        policies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(policies)
    }

    async fn delete_policy(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().await.policies.remove(id).is_some())
    }

    async fn insert_template(&self, template: &EmailTemplate) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.templates.contains_key(&template.id) {
            return Err(StoreError::DuplicateId(template.id.clone()));
        }
        inner.check_template_name(template)?;
        if template.is_default {
            inner.clear_default(template.tenant_id, &template.id);
        }
        inner.templates.insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn update_template(&self, template: &EmailTemplate) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.templates.contains_key(&template.id) {
            return Ok(false);
        }
        inner.check_template_name(template)?;
        if template.is_default {
            inner.clear_default(template.tenant_id, &template.id);
        }
        inner.templates.insert(template.id.clone(), template.clone());
        Ok(true)
    }

    async fn get_template(&self, id: &str) -> StoreResult<Option<EmailTemplate>> {
        Ok(self.inner.lock().await.templates.get(id).cloned())
    }

    async fn get_default_template(&self, tenant_id: u32) -> StoreResult<Option<EmailTemplate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .templates
            .values()
            .find(|t| t.tenant_id == tenant_id && t.is_default)
            .cloned())
    }

    async fn list_templates(
        &self,
        tenant_id: u32,
        page: PageRequest,
    ) -> StoreResult<(Vec<EmailTemplate>, usize)> {
        let inner = self.inner.lock().await;
        let mut templates: Vec<EmailTemplate> = inner
            .templates
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect();
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let total = templates.len();
        Ok((page.apply(templates), total))
    }

    async fn delete_template(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().await.templates.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::conformance;
    use super::*;

    #[tokio::test]
    async fn links_roundtrip_and_token_is_unique() {
        conformance::links_roundtrip_and_token_is_unique(&MemoryShareStore::new()).await;
    }

    #[tokio::test]
    async fn consume_is_one_shot() {
        conformance::consume_is_one_shot(&MemoryShareStore::new()).await;
    }

    #[tokio::test]
    async fn revoke_preempts_consume() {
        conformance::revoke_preempts_consume(&MemoryShareStore::new()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consume_has_one_winner() {
        conformance::concurrent_consume_has_one_winner(Arc::new(MemoryShareStore::new())).await;
    }

    #[tokio::test]
    async fn list_links_filters_and_pages() {
        conformance::list_links_filters_and_pages(&MemoryShareStore::new()).await;
    }

    #[tokio::test]
    async fn policies_are_scoped_and_ordered() {
        conformance::policies_are_scoped_and_ordered(&MemoryShareStore::new()).await;
    }

    #[tokio::test]
    async fn templates_enforce_name_and_single_default() {
        conformance::templates_enforce_name_and_single_default(&MemoryShareStore::new()).await;
    }
}
