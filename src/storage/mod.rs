// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Storage
//!
//! Persistence for share links, their access policies and email templates.
//!
//! The lifecycle only talks to [`ShareStore`]. Two backends implement it:
//!
//! - [`RedbShareStore`]: embedded ACID database file under `DATA_DIR`
//! - [`MemoryShareStore`]: process-local maps, used by tests and
//!   `STORE_BACKEND=memory`
//!
//! ## One-time consumption
//!
//! [`ShareStore::consume`] is the only way a link becomes viewed. It checks
//! `revoked` and `viewed` and sets `viewed`, `viewed_at`, `viewed_ip` as one
//! atomic step and reports which case applied. Callers must not read the
//! link, decide, then write: two concurrent viewers would both win.

pub mod memory;
pub mod records;
pub mod redb_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::policy::SharePolicy;

pub use memory::MemoryShareStore;
pub use records::{EmailTemplate, PageRequest, ShareLink, ShareLinkFilter};
pub use redb_store::RedbShareStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("share token already in use")]
    TokenConflict,

    #[error("record {0} already exists")]
    DuplicateId(String),

    #[error("template name {0:?} already exists for this tenant")]
    TemplateNameTaken(String),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of the atomic view transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// This caller won; the returned link is the post-update record.
    Consumed(ShareLink),
    AlreadyViewed,
    Revoked,
    NotFound,
}

#[async_trait]
pub trait ShareStore: Send + Sync {
    // Links

    /// Insert a new link. Fails with [`StoreError::TokenConflict`] if the
    /// token is taken.
    async fn insert_link(&self, link: &ShareLink) -> StoreResult<()>;

    async fn get_link(&self, id: &str) -> StoreResult<Option<ShareLink>>;

    async fn get_link_by_token(&self, token: &str) -> StoreResult<Option<ShareLink>>;

    /// Links of a tenant, newest first, with the unpaged total.
    async fn list_links(
        &self,
        tenant_id: u32,
        filter: &ShareLinkFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<ShareLink>, usize)>;

    /// Set `viewed` only if the link is neither viewed nor revoked.
    async fn consume(
        &self,
        id: &str,
        viewed_at: DateTime<Utc>,
        viewed_ip: &str,
    ) -> StoreResult<ConsumeOutcome>;

    /// Set `revoked`. Returns `false` if the link does not exist.
    async fn revoke(&self, id: &str) -> StoreResult<bool>;

    // Policies

    async fn insert_policy(&self, policy: &SharePolicy) -> StoreResult<()>;

    async fn get_policy(&self, id: &str) -> StoreResult<Option<SharePolicy>>;

    /// Policies of a link, oldest first.
    async fn list_policies(&self, share_link_id: &str) -> StoreResult<Vec<SharePolicy>>;

    async fn delete_policy(&self, id: &str) -> StoreResult<bool>;

    // Templates

    /// Insert a template. Name must be unique per tenant; a default
    /// template clears the tenant's previous default.
    async fn insert_template(&self, template: &EmailTemplate) -> StoreResult<()>;

    /// Replace an existing template under the same rules as insert.
    /// Returns `false` if it does not exist.
    async fn update_template(&self, template: &EmailTemplate) -> StoreResult<bool>;

    async fn get_template(&self, id: &str) -> StoreResult<Option<EmailTemplate>>;

    async fn get_default_template(&self, tenant_id: u32) -> StoreResult<Option<EmailTemplate>>;

    /// Templates of a tenant, newest first, with the unpaged total.
    async fn list_templates(
        &self,
        tenant_id: u32,
        page: PageRequest,
    ) -> StoreResult<(Vec<EmailTemplate>, usize)>;

    async fn delete_template(&self, id: &str) -> StoreResult<bool>;
}

/// Behaviour every backend must share. Each backend's tests run these.
#[cfg(test)]
pub(crate) mod conformance {
    use std::sync::Arc;

    use chrono::Duration;

    use super::records::fixtures;
    use super::*;
    use crate::policy::{PolicyMethod, PolicyType};

    fn token(n: u8) -> String {
        format!("{:02x}", n).repeat(32)
    }

    fn policy(id: &str, link_id: &str, offset_secs: i64) -> SharePolicy {
        SharePolicy {
            id: id.to_string(),
            tenant_id: 1,
            share_link_id: link_id.to_string(),
            policy_type: PolicyType::Blacklist,
            method: PolicyMethod::Ip,
            value: "1.2.3.4".to_string(),
            reason: None,
            created_by: None,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    pub async fn links_roundtrip_and_token_is_unique(store: &dyn ShareStore) {
        let link = fixtures::link("l1", 1, &token(1));
        store.insert_link(&link).await.unwrap();

        assert_eq!(store.get_link("l1").await.unwrap(), Some(link.clone()));
        assert_eq!(
            store.get_link_by_token(&token(1)).await.unwrap(),
            Some(link)
        );
        assert_eq!(store.get_link("missing").await.unwrap(), None);
        assert_eq!(store.get_link_by_token(&token(9)).await.unwrap(), None);

        let clash = fixtures::link("l2", 1, &token(1));
        assert!(matches!(
            store.insert_link(&clash).await,
            Err(StoreError::TokenConflict)
        ));
        assert_eq!(store.get_link("l2").await.unwrap(), None);
    }

    pub async fn consume_is_one_shot(store: &dyn ShareStore) {
        store
            .insert_link(&fixtures::link("l1", 1, &token(1)))
            .await
            .unwrap();
        let when = Utc::now();

        match store.consume("l1", when, "10.0.0.5").await.unwrap() {
            ConsumeOutcome::Consumed(link) => {
                assert!(link.viewed);
                assert_eq!(link.viewed_at, Some(when));
                assert_eq!(link.viewed_ip.as_deref(), Some("10.0.0.5"));
            }
            other => panic!("expected Consumed, got {other:?}"),
        }
        assert_eq!(
            store.consume("l1", when, "10.0.0.6").await.unwrap(),
            ConsumeOutcome::AlreadyViewed
        );
        assert_eq!(
            store.consume("nope", when, "").await.unwrap(),
            ConsumeOutcome::NotFound
        );

        let stored = store.get_link("l1").await.unwrap().unwrap();
        assert_eq!(stored.viewed_ip.as_deref(), Some("10.0.0.5"));
    }

    pub async fn revoke_preempts_consume(store: &dyn ShareStore) {
        store
            .insert_link(&fixtures::link("l1", 1, &token(1)))
            .await
            .unwrap();
        assert!(store.revoke("l1").await.unwrap());
        assert!(store.revoke("l1").await.unwrap());
        assert!(!store.revoke("missing").await.unwrap());

        assert_eq!(
            store.consume("l1", Utc::now(), "").await.unwrap(),
            ConsumeOutcome::Revoked
        );
        let stored = store.get_link("l1").await.unwrap().unwrap();
        assert!(stored.revoked);
        assert!(!stored.viewed);

        // Revoking a viewed link keeps it viewed.
        store
            .insert_link(&fixtures::link("l2", 1, &token(2)))
            .await
            .unwrap();
        store.consume("l2", Utc::now(), "").await.unwrap();
        assert!(store.revoke("l2").await.unwrap());
        let stored = store.get_link("l2").await.unwrap().unwrap();
        assert!(stored.viewed && stored.revoked);
    }

    pub async fn concurrent_consume_has_one_winner(store: Arc<dyn ShareStore>) {
        store
            .insert_link(&fixtures::link("l1", 1, &token(1)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .consume("l1", Utc::now(), &format!("10.0.0.{i}"))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ConsumeOutcome::Consumed(_) => winners += 1,
                ConsumeOutcome::AlreadyViewed => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(winners, 1);
        assert!(store.get_link("l1").await.unwrap().unwrap().viewed);
    }

    pub async fn list_links_filters_and_pages(store: &dyn ShareStore) {
        let base = Utc::now();
        for i in 0..5u8 {
            let mut link = fixtures::link(&format!("l{i}"), 1, &token(i));
            link.created_at = base + Duration::seconds(i64::from(i));
            if i % 2 == 0 {
                link.resource_type = crate::providers::ResourceKind::Document;
            }
            store.insert_link(&link).await.unwrap();
        }
        store
            .insert_link(&fixtures::link("other", 2, &token(99)))
            .await
            .unwrap();

        let (all, total) = store
            .list_links(1, &ShareLinkFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 5);
        let ids: Vec<_> = all.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["l4", "l3", "l2", "l1", "l0"]);

        let (page, total) = store
            .list_links(1, &ShareLinkFilter::default(), PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(total, 5);
        let ids: Vec<_> = page.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["l2", "l1"]);

        let docs = ShareLinkFilter {
            resource_type: Some(crate::providers::ResourceKind::Document),
            recipient_email: None,
        };
        let (found, total) = store
            .list_links(1, &docs, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert!(found.iter().all(|l| l.tenant_id == 1));
    }

    pub async fn policies_are_scoped_and_ordered(store: &dyn ShareStore) {
        store.insert_policy(&policy("p2", "l1", 5)).await.unwrap();
        store.insert_policy(&policy("p1", "l1", 0)).await.unwrap();
        store.insert_policy(&policy("p3", "l2", 0)).await.unwrap();

        let listed = store.list_policies("l1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert!(store.list_policies("none").await.unwrap().is_empty());

        assert!(store.get_policy("p3").await.unwrap().is_some());
        assert!(store.delete_policy("p1").await.unwrap());
        assert!(!store.delete_policy("p1").await.unwrap());
        assert_eq!(store.list_policies("l1").await.unwrap().len(), 1);
        assert!(matches!(
            store.insert_policy(&policy("p2", "l1", 0)).await,
            Err(StoreError::DuplicateId(_))
        ));
    }

    pub async fn templates_enforce_name_and_single_default(store: &dyn ShareStore) {
        store
            .insert_template(&fixtures::template("t1", 1, "welcome", true))
            .await
            .unwrap();
        store
            .insert_template(&fixtures::template("t2", 2, "welcome", true))
            .await
            .unwrap();
        assert!(matches!(
            store
                .insert_template(&fixtures::template("t3", 1, "welcome", false))
                .await,
            Err(StoreError::TemplateNameTaken(_))
        ));

        let mut second = fixtures::template("t4", 1, "formal", true);
        second.created_at = Utc::now() + Duration::seconds(10);
        store.insert_template(&second).await.unwrap();

        assert_eq!(
            store.get_default_template(1).await.unwrap().map(|t| t.id),
            Some("t4".to_string())
        );
        assert!(!store.get_template("t1").await.unwrap().unwrap().is_default);
        assert!(store.get_template("t2").await.unwrap().unwrap().is_default);

        let (listed, total) = store
            .list_templates(1, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(listed[0].id, "t4");

        // Renaming onto a taken name fails; renaming itself is fine.
        let mut renamed = store.get_template("t1").await.unwrap().unwrap();
        renamed.name = "formal".to_string();
        assert!(matches!(
            store.update_template(&renamed).await,
            Err(StoreError::TemplateNameTaken(_))
        ));
        renamed.name = "welcome".to_string();
        renamed.is_default = true;
        assert!(store.update_template(&renamed).await.unwrap());
        assert_eq!(
            store.get_default_template(1).await.unwrap().map(|t| t.id),
            Some("t1".to_string())
        );

        let ghost = fixtures::template("ghost", 1, "ghost", false);
        assert!(!store.update_template(&ghost).await.unwrap());

        assert!(store.delete_template("t1").await.unwrap());
        assert!(!store.delete_template("t1").await.unwrap());
        assert_eq!(store.get_default_template(1).await.unwrap(), None);
    }
}
