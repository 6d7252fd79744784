// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Share store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `share_links`: link id → serialized ShareLink
//! - `share_tokens`: token → link id (enforces token uniqueness)
//! - `share_policies`: policy id → serialized SharePolicy
//! - `link_policy_index`: composite key (link_id|created_be|policy_id) → policy id
//! - `email_templates`: template id → serialized EmailTemplate
//!
//! redb admits one write transaction at a time. Consume, revoke and the
//! template default/name rules read and write inside a single write
//! transaction, which makes each of them atomic.
//!
//! redb is synchronous; every call runs on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{
    ConsumeOutcome, EmailTemplate, PageRequest, ShareLink, ShareLinkFilter, ShareStore,
    StoreError, StoreResult,
};
use crate::policy::SharePolicy;

// =============================================================================
// Table Definitions
// =============================================================================

const SHARE_LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("share_links");

const SHARE_TOKENS: TableDefinition<&str, &str> = TableDefinition::new("share_tokens");

const SHARE_POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("share_policies");

/// Key format: `link_id | created_at_micros (order-preserving BE) | policy_id`
/// so a forward range scan yields a link's policies oldest first.
const LINK_POLICY_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("link_policy_index");

const EMAIL_TEMPLATES: TableDefinition<&str, &[u8]> = TableDefinition::new("email_templates");

// =============================================================================
// Index Key Helpers
// =============================================================================

fn make_policy_key(link_id: &str, created_at: DateTime<Utc>, policy_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(link_id.len() + 1 + 8 + 1 + policy_id.len());
    key.extend_from_slice(link_id.as_bytes());
    key.push(b'|');
    // Flip the sign bit so negative timestamps still sort first.
    let ordered = (created_at.timestamp_micros() as u64) ^ (1 << 63);
    key.extend_from_slice(&ordered.to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(policy_id.as_bytes());
    key
}

fn make_prefix(link_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(link_id.len() + 1);
    prefix.extend_from_slice(link_id.as_bytes());
    prefix.push(b'|');
    prefix
}

fn make_prefix_end(link_id: &str) -> Vec<u8> {
    let mut end = make_prefix(link_id);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// RedbShareStore
// =============================================================================

pub struct RedbShareStore {
    db: Arc<Database>,
}

impl RedbShareStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SHARE_LINKS)?;
            let _ = write_txn.open_table(SHARE_TOKENS)?;
            let _ = write_txn.open_table(SHARE_POLICIES)?;
            let _ = write_txn.open_table(LINK_POLICY_INDEX)?;
            let _ = write_txn.open_table(EMAIL_TEMPLATES)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn read_link(db: &Database, id: &str) -> StoreResult<Option<ShareLink>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(SHARE_LINKS)?;
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn read_template(db: &Database, id: &str) -> StoreResult<Option<EmailTemplate>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(EMAIL_TEMPLATES)?;
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn tenant_templates(db: &Database, tenant_id: u32) -> StoreResult<Vec<EmailTemplate>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(EMAIL_TEMPLATES)?;
    let mut templates = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        let template: EmailTemplate = serde_json::from_slice(value.value())?;
        if template.tenant_id == tenant_id {
            templates.push(template);
        }
    }
    Ok(templates)
}

/// Write a template inside `write_txn`, enforcing name uniqueness and the
/// single default per tenant.
fn put_template(
    write_txn: &redb::WriteTransaction,
    template: &EmailTemplate,
) -> StoreResult<()> {
    let mut table = write_txn.open_table(EMAIL_TEMPLATES)?;

    let mut others = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        let other: EmailTemplate = serde_json::from_slice(value.value())?;
        if other.tenant_id == template.tenant_id && other.id != template.id {
            others.push(other);
        }
    }

    if others.iter().any(|o| o.name == template.name) {
        return Err(StoreError::TemplateNameTaken(template.name.clone()));
    }

    if template.is_default {
        for mut other in others.into_iter().filter(|o| o.is_default) {
            other.is_default = false;
            let json = serde_json::to_vec(&other)?;
            table.insert(other.id.as_str(), json.as_slice())?;
        }
    }

    let json = serde_json::to_vec(template)?;
    table.insert(template.id.as_str(), json.as_slice())?;
    Ok(())
}

#[async_trait]
impl ShareStore for RedbShareStore {
    async fn insert_link(&self, link: &ShareLink) -> StoreResult<()> {
        let link = link.clone();
        self.blocking(move |db| {
            let json = serde_json::to_vec(&link)?;
            let write_txn = db.begin_write()?;
            {
                let mut tokens = write_txn.open_table(SHARE_TOKENS)?;
                if tokens.get(link.token.as_str())?.is_some() {
                    return Err(StoreError::TokenConflict);
                }
                let mut links = write_txn.open_table(SHARE_LINKS)?;
                if links.get(link.id.as_str())?.is_some() {
                    return Err(StoreError::DuplicateId(link.id.clone()));
                }
                tokens.insert(link.token.as_str(), link.id.as_str())?;
                links.insert(link.id.as_str(), json.as_slice())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_link(&self, id: &str) -> StoreResult<Option<ShareLink>> {
        let id = id.to_string();
        self.blocking(move |db| read_link(db, &id)).await
    }

    async fn get_link_by_token(&self, token: &str) -> StoreResult<Option<ShareLink>> {
        let token = token.to_string();
        self.blocking(move |db| {
            let read_txn = db.begin_read()?;
            let tokens = read_txn.open_table(SHARE_TOKENS)?;
            let Some(id) = tokens.get(token.as_str())?.map(|v| v.value().to_string()) else {
                return Ok(None);
            };
            let links = read_txn.open_table(SHARE_LINKS)?;
            match links.get(id.as_str())? {
                Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_links(
        &self,
        tenant_id: u32,
        filter: &ShareLinkFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<ShareLink>, usize)> {
        let filter = filter.clone();
        self.blocking(move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(SHARE_LINKS)?;
            let mut links = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let link: ShareLink = serde_json::from_slice(value.value())?;
                if link.tenant_id == tenant_id && filter.matches(&link) {
                    links.push(link);
                }
            }
            links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
            let total = links.len();
            Ok((page.apply(links), total))
        })
        .await
    }

    async fn consume(
        &self,
        id: &str,
        viewed_at: DateTime<Utc>,
        viewed_ip: &str,
    ) -> StoreResult<ConsumeOutcome> {
        let id = id.to_string();
        let viewed_ip = viewed_ip.to_string();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let outcome = {
                let mut table = write_txn.open_table(SHARE_LINKS)?;
                let existing = table.get(id.as_str())?.map(|v| v.value().to_vec());
                match existing {
                    None => ConsumeOutcome::NotFound,
                    Some(bytes) => {
                        let mut link: ShareLink = serde_json::from_slice(&bytes)?;
                        if link.revoked {
                            ConsumeOutcome::Revoked
                        } else if link.viewed {
                            ConsumeOutcome::AlreadyViewed
                        } else {
                            link.viewed = true;
                            link.viewed_at = Some(viewed_at);
                            link.viewed_ip = Some(viewed_ip);
                            let json = serde_json::to_vec(&link)?;
                            table.insert(id.as_str(), json.as_slice())?;
                            ConsumeOutcome::Consumed(link)
                        }
                    }
                }
            };
            write_txn.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn revoke(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let found = {
                let mut table = write_txn.open_table(SHARE_LINKS)?;
                let existing = table.get(id.as_str())?.map(|v| v.value().to_vec());
                match existing {
                    None => false,
                    Some(bytes) => {
                        let mut link: ShareLink = serde_json::from_slice(&bytes)?;
                        if !link.revoked {
                            link.revoked = true;
                            let json = serde_json::to_vec(&link)?;
                            table.insert(id.as_str(), json.as_slice())?;
                        }
                        true
                    }
                }
            };
            write_txn.commit()?;
            Ok(found)
        })
        .await
    }

    async fn insert_policy(&self, policy: &SharePolicy) -> StoreResult<()> {
        let policy = policy.clone();
        self.blocking(move |db| {
            let json = serde_json::to_vec(&policy)?;
            let key = make_policy_key(&policy.share_link_id, policy.created_at, &policy.id);
            let write_txn = db.begin_write()?;
            {
                let mut policies = write_txn.open_table(SHARE_POLICIES)?;
                if policies.get(policy.id.as_str())?.is_some() {
                    return Err(StoreError::DuplicateId(policy.id.clone()));
                }
                policies.insert(policy.id.as_str(), json.as_slice())?;

                let mut index = write_txn.open_table(LINK_POLICY_INDEX)?;
                index.insert(key.as_slice(), policy.id.as_str())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_policy(&self, id: &str) -> StoreResult<Option<SharePolicy>> {
        let id = id.to_string();
        self.blocking(move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(SHARE_POLICIES)?;
            match table.get(id.as_str())? {
                Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_policies(&self, share_link_id: &str) -> StoreResult<Vec<SharePolicy>> {
        let share_link_id = share_link_id.to_string();
        self.blocking(move |db| {
            let read_txn = db.begin_read()?;
            let index = read_txn.open_table(LINK_POLICY_INDEX)?;
            let policies = read_txn.open_table(SHARE_POLICIES)?;

            let prefix = make_prefix(&share_link_id);
            let prefix_end = make_prefix_end(&share_link_id);

            let mut results = Vec::new();
            for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
                let (_, policy_id) = entry?;
                if let Some(value) = policies.get(policy_id.value())? {
                    results.push(serde_json::from_slice(value.value())?);
                }
            }
            Ok(results)
        })
        .await
    }

    async fn delete_policy(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let found = {
                let mut policies = write_txn.open_table(SHARE_POLICIES)?;
                let removed = policies.remove(id.as_str())?.map(|v| v.value().to_vec());
                match removed {
                    None => false,
                    Some(bytes) => {
                        let policy: SharePolicy = serde_json::from_slice(&bytes)?;
                        let key =
                            make_policy_key(&policy.share_link_id, policy.created_at, &policy.id);
                        let mut index = write_txn.open_table(LINK_POLICY_INDEX)?;
                        index.remove(key.as_slice())?;
                        true
                    }
                }
            };
            write_txn.commit()?;
            Ok(found)
        })
        .await
    }

    async fn insert_template(&self, template: &EmailTemplate) -> StoreResult<()> {
        let template = template.clone();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            {
                let table = write_txn.open_table(EMAIL_TEMPLATES)?;
                if table.get(template.id.as_str())?.is_some() {
                    return Err(StoreError::DuplicateId(template.id.clone()));
                }
            }
            put_template(&write_txn, &template)?;
            write_txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn update_template(&self, template: &EmailTemplate) -> StoreResult<bool> {
        let template = template.clone();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            {
                let table = write_txn.open_table(EMAIL_TEMPLATES)?;
                if table.get(template.id.as_str())?.is_none() {
                    return Ok(false);
                }
            }
            put_template(&write_txn, &template)?;
            write_txn.commit()?;
            Ok(true)
        })
        .await
    }

    async fn get_template(&self, id: &str) -> StoreResult<Option<EmailTemplate>> {
        let id = id.to_string();
        self.blocking(move |db| read_template(db, &id)).await
    }

    async fn get_default_template(&self, tenant_id: u32) -> StoreResult<Option<EmailTemplate>> {
        self.blocking(move |db| {
            Ok(tenant_templates(db, tenant_id)?
                .into_iter()
                .find(|t| t.is_default))
        })
        .await
    }

    async fn list_templates(
        &self,
        tenant_id: u32,
        page: PageRequest,
    ) -> StoreResult<(Vec<EmailTemplate>, usize)> {
        self.blocking(move |db| {
            let mut templates = tenant_templates(db, tenant_id)?;
            templates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
            let total = templates.len();
            Ok((page.apply(templates), total))
        })
        .await
    }

    async fn delete_template(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let found = {
                let mut table = write_txn.open_table(EMAIL_TEMPLATES)?;
                let removed = table.remove(id.as_str())?;
                removed.is_some()
            };
            write_txn.commit()?;
            Ok(found)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::conformance;
    use super::super::records::fixtures;
    use super::*;

    fn temp_store() -> (RedbShareStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbShareStore::open(&dir.path().join("sharing.redb")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn links_roundtrip_and_token_is_unique() {
        let (store, _dir) = temp_store();
        conformance::links_roundtrip_and_token_is_unique(&store).await;
    }

    #[tokio::test]
    async fn consume_is_one_shot() {
        let (store, _dir) = temp_store();
        conformance::consume_is_one_shot(&store).await;
    }

    #[tokio::test]
    async fn revoke_preempts_consume() {
        let (store, _dir) = temp_store();
        conformance::revoke_preempts_consume(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consume_has_one_winner() {
        let (store, _dir) = temp_store();
        conformance::concurrent_consume_has_one_winner(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn list_links_filters_and_pages() {
        let (store, _dir) = temp_store();
        conformance::list_links_filters_and_pages(&store).await;
    }

    #[tokio::test]
    async fn policies_are_scoped_and_ordered() {
        let (store, _dir) = temp_store();
        conformance::policies_are_scoped_and_ordered(&store).await;
    }

    #[tokio::test]
    async fn templates_enforce_name_and_single_default() {
        let (store, _dir) = temp_store();
        conformance::templates_enforce_name_and_single_default(&store).await;
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sharing.redb");
        let token = "ab".repeat(32);
        {
            let store = RedbShareStore::open(&path).unwrap();
            store
                .insert_link(&fixtures::link("l1", 1, &token))
                .await
                .unwrap();
            store.consume("l1", Utc::now(), "10.0.0.5").await.unwrap();
        }

        let store = RedbShareStore::open(&path).unwrap();
        let link = store.get_link_by_token(&token).await.unwrap().unwrap();
        assert!(link.viewed);
        assert_eq!(
            store.consume("l1", Utc::now(), "10.0.0.6").await.unwrap(),
            ConsumeOutcome::AlreadyViewed
        );
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("sharing.redb");
        RedbShareStore::open(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn unusable_parent_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"occupied").unwrap();
        let result = RedbShareStore::open(&blocker.join("sharing.redb"));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn policy_keys_sort_by_time() {
        let early = DateTime::from_timestamp(1_000, 0).unwrap();
        let late = DateTime::from_timestamp(2_000, 0).unwrap();
        let a = make_policy_key("link", early, "zzz");
        let b = make_policy_key("link", late, "aaa");
        assert!(a < b);
        assert!(a.as_slice() >= make_prefix("link").as_slice());
        assert!(b.as_slice() < make_prefix_end("link").as_slice());
    }
}
