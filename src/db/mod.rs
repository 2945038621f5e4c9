// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote record store (Supabase or Firestore).
//!
//! Every read and write is scoped to one owner ID, so users never contend
//! for the same rows.

pub mod firestore;
pub mod supabase;

pub use firestore::FirestoreRecordStore;
pub use supabase::SupabaseRecordStore;

use crate::config::{Config, RemoteBackend};
use crate::error::{StoreError, StoreResult};
use crate::models::{ScanRecord, ViewedTopic};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Table/collection names as constants.
pub mod collections {
    pub const SCAN_HISTORY: &str = "scan_history";
    pub const VIEWED_TOPICS: &str = "viewed_topics";
    /// Column holding the owner ID in both tables
    pub const OWNER_FIELD: &str = "user_id";
}

/// Queryable remote store for a user's scans and viewed topics.
pub trait RemoteRecordStore: Send + Sync + 'static {
    /// Scans owned by `owner`, newest first.
    fn fetch_scans(&self, owner: &str)
        -> impl Future<Output = StoreResult<Vec<ScanRecord>>> + Send;

    /// Topics viewed by `owner`, in no particular order.
    fn fetch_topics(
        &self,
        owner: &str,
    ) -> impl Future<Output = StoreResult<Vec<ViewedTopic>>> + Send;

    /// Insert one scan tagged with its owner.
    fn insert_scan(
        &self,
        owner: &str,
        scan: &ScanRecord,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Insert one viewed topic tagged with its owner.
    fn insert_topic(
        &self,
        owner: &str,
        topic: &ViewedTopic,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

impl<T: RemoteRecordStore> RemoteRecordStore for Arc<T> {
    async fn fetch_scans(&self, owner: &str) -> StoreResult<Vec<ScanRecord>> {
        (**self).fetch_scans(owner).await
    }

    async fn fetch_topics(&self, owner: &str) -> StoreResult<Vec<ViewedTopic>> {
        (**self).fetch_topics(owner).await
    }

    async fn insert_scan(&self, owner: &str, scan: &ScanRecord) -> StoreResult<()> {
        (**self).insert_scan(owner, scan).await
    }

    async fn insert_topic(&self, owner: &str, topic: &ViewedTopic) -> StoreResult<()> {
        (**self).insert_topic(owner, topic).await
    }
}

/// Stored scan row: the record plus its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub id: String,
    pub user_id: String,
    pub timestamp: i64,
    pub label: String,
    pub confidence: f64,
    pub severity: u32,
}

impl ScanRow {
    pub fn new(owner: &str, scan: &ScanRecord) -> Self {
        Self {
            id: scan.id.clone(),
            user_id: owner.to_string(),
            timestamp: scan.timestamp,
            label: scan.label.clone(),
            confidence: scan.confidence,
            severity: scan.severity,
        }
    }
}

impl From<ScanRow> for ScanRecord {
    fn from(row: ScanRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            label: row.label,
            confidence: row.confidence,
            severity: row.severity,
        }
    }
}

/// Stored viewed-topic row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRow {
    pub user_id: String,
    pub title: String,
    pub timestamp: i64,
}

impl TopicRow {
    pub fn new(owner: &str, topic: &ViewedTopic) -> Self {
        Self {
            user_id: owner.to_string(),
            title: topic.title.clone(),
            timestamp: topic.timestamp,
        }
    }
}

impl From<TopicRow> for ViewedTopic {
    fn from(row: TopicRow) -> Self {
        Self {
            title: row.title,
            timestamp: row.timestamp,
        }
    }
}

/// Record store selected by configuration.
#[derive(Clone)]
pub enum RecordStore {
    Supabase(SupabaseRecordStore),
    Firestore(FirestoreRecordStore),
}

impl RecordStore {
    /// Connect to the backend named in the config.
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        match config.remote_backend {
            RemoteBackend::Supabase => {
                let url = config.supabase_url.as_deref().ok_or_else(|| {
                    StoreError::Database("SUPABASE_URL is not configured".to_string())
                })?;
                let key = config.supabase_anon_key.as_deref().ok_or_else(|| {
                    StoreError::Database("SUPABASE_ANON_KEY is not configured".to_string())
                })?;
                Ok(Self::Supabase(SupabaseRecordStore::new(url, key)?))
            }
            RemoteBackend::Firestore => Ok(Self::Firestore(
                FirestoreRecordStore::new(&config.firebase_project_id).await?,
            )),
        }
    }
}

impl RemoteRecordStore for RecordStore {
    async fn fetch_scans(&self, owner: &str) -> StoreResult<Vec<ScanRecord>> {
        match self {
            Self::Supabase(store) => store.fetch_scans(owner).await,
            Self::Firestore(store) => store.fetch_scans(owner).await,
        }
    }

    async fn fetch_topics(&self, owner: &str) -> StoreResult<Vec<ViewedTopic>> {
        match self {
            Self::Supabase(store) => store.fetch_topics(owner).await,
            Self::Firestore(store) => store.fetch_topics(owner).await,
        }
    }

    async fn insert_scan(&self, owner: &str, scan: &ScanRecord) -> StoreResult<()> {
        match self {
            Self::Supabase(store) => store.insert_scan(owner, scan).await,
            Self::Firestore(store) => store.insert_scan(owner, scan).await,
        }
    }

    async fn insert_topic(&self, owner: &str, topic: &ViewedTopic) -> StoreResult<()> {
        match self {
            Self::Supabase(store) => store.insert_topic(owner, topic).await,
            Self::Firestore(store) => store.insert_topic(owner, topic).await,
        }
    }
}
