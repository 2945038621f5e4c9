// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase (PostgREST) record store.
//!
//! Rows live in the `scan_history` and `viewed_topics` tables, each with a
//! `user_id` column holding the owner ID.

use crate::db::{collections, RemoteRecordStore, ScanRow, TopicRow};
use crate::error::{StoreError, StoreResult};
use crate::models::{ScanRecord, ViewedTopic};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgREST client for the session tables.
#[derive(Clone)]
pub struct SupabaseRecordStore {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
}

impl SupabaseRecordStore {
    /// Create a client for the project at `project_url` (e.g. `https://xyz.supabase.co`).
    pub fn new(project_url: &str, anon_key: &str) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed building HTTP client: {e}")))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        })
    }

    /// URL selecting one owner's rows from `table`.
    fn select_url(&self, table: &str, owner: &str, order: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}?select=*&{}=eq.{}",
            self.rest_url,
            table,
            collections::OWNER_FIELD,
            urlencoding::encode(owner)
        );
        if let Some(order) = order {
            url.push_str("&order=");
            url.push_str(order);
        }
        url
    }

    async fn select<T: DeserializeOwned>(&self, url: &str) -> StoreResult<Vec<T>> {
        let response = self
            .http
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let response = check_response(response).await?;

        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn insert<T: Serialize>(&self, table: &str, row: &T) -> StoreResult<()> {
        let url = format!("{}/{}", self.rest_url, table);

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(&self.anon_key)
            .json(&[row])
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        check_response(response).await?;
        Ok(())
    }
}

/// Turn non-success statuses into `StoreError::Rejected`.
async fn check_response(response: reqwest::Response) -> StoreResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected { status, body })
}

impl RemoteRecordStore for SupabaseRecordStore {
    async fn fetch_scans(&self, owner: &str) -> StoreResult<Vec<ScanRecord>> {
        let url = self.select_url(collections::SCAN_HISTORY, owner, Some("timestamp.desc"));
        let rows: Vec<ScanRow> = self.select(&url).await?;
        Ok(rows.into_iter().map(ScanRecord::from).collect())
    }

    async fn fetch_topics(&self, owner: &str) -> StoreResult<Vec<ViewedTopic>> {
        let url = self.select_url(collections::VIEWED_TOPICS, owner, None);
        let rows: Vec<TopicRow> = self.select(&url).await?;
        Ok(rows.into_iter().map(ViewedTopic::from).collect())
    }

    async fn insert_scan(&self, owner: &str, scan: &ScanRecord) -> StoreResult<()> {
        self.insert(collections::SCAN_HISTORY, &ScanRow::new(owner, scan))
            .await
    }

    async fn insert_topic(&self, owner: &str, topic: &ViewedTopic) -> StoreResult<()> {
        self.insert(collections::VIEWED_TOPICS, &TopicRow::new(owner, topic))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_url_filters_by_owner() {
        let store = SupabaseRecordStore::new("https://demo.supabase.co/", "anon").unwrap();

        assert_eq!(
            store.select_url("scan_history", "uid 1", Some("timestamp.desc")),
            "https://demo.supabase.co/rest/v1/scan_history?select=*&user_id=eq.uid%201&order=timestamp.desc"
        );
        assert_eq!(
            store.select_url("viewed_topics", "abc", None),
            "https://demo.supabase.co/rest/v1/viewed_topics?select=*&user_id=eq.abc"
        );
    }
}
