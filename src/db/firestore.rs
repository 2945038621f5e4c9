// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore record store.
//!
//! Provides typed operations for:
//! - Scan history (document ID = scan ID)
//! - Viewed topics (document ID = owner + encoded title, so re-inserts are idempotent)

use crate::db::{collections, RemoteRecordStore, ScanRow, TopicRow};
use crate::error::{StoreError, StoreResult};
use crate::models::{ScanRecord, ViewedTopic};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreRecordStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreRecordStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> StoreResult<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> StoreResult<Self> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// All operations return `StoreError::NotConnected`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> StoreResult<&firestore::FirestoreDb> {
        self.client.as_ref().ok_or(StoreError::NotConnected)
    }
}

/// Document ID for a viewed topic.
pub fn topic_document_id(owner: &str, title: &str) -> String {
    format!("{}_{}", owner, urlencoding::encode(title))
}

impl RemoteRecordStore for FirestoreRecordStore {
    async fn fetch_scans(&self, owner: &str) -> StoreResult<Vec<ScanRecord>> {
        let rows: Vec<ScanRow> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SCAN_HISTORY)
            .filter(|q| q.for_all([q.field(collections::OWNER_FIELD).eq(owner)]))
            .order_by([("timestamp", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ScanRecord::from).collect())
    }

    async fn fetch_topics(&self, owner: &str) -> StoreResult<Vec<ViewedTopic>> {
        let rows: Vec<TopicRow> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::VIEWED_TOPICS)
            .filter(|q| q.for_all([q.field(collections::OWNER_FIELD).eq(owner)]))
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ViewedTopic::from).collect())
    }

    async fn insert_scan(&self, owner: &str, scan: &ScanRecord) -> StoreResult<()> {
        let row = ScanRow::new(owner, scan);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SCAN_HISTORY)
            .document_id(&row.id)
            .object(&row)
            .execute()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn insert_topic(&self, owner: &str, topic: &ViewedTopic) -> StoreResult<()> {
        let row = TopicRow::new(owner, topic);
        let doc_id = topic_document_id(owner, &row.title);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::VIEWED_TOPICS)
            .document_id(&doc_id)
            .object(&row)
            .execute()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_document_id_is_path_safe() {
        assert_eq!(
            topic_document_id("uid1", "Symptoms & Early Signs"),
            "uid1_Symptoms%20%26%20Early%20Signs"
        );
        assert!(!topic_document_id("uid1", "a/b").contains('/'));
    }

    #[tokio::test]
    async fn test_offline_store_reports_not_connected() {
        let store = FirestoreRecordStore::new_mock();
        assert!(matches!(
            store.fetch_scans("uid1").await,
            Err(StoreError::NotConnected)
        ));
    }
}
