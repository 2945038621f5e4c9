// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store: who is signed in, which role they act as, and what they
//! have done (scans, viewed topics).
//!
//! State is seeded from local persistence, replaced by remote fetches on
//! every identity change, and published to observers as immutable
//! [`SessionState`] snapshots over a `watch` channel.

pub mod writer;

pub use writer::RetryPolicy;

use crate::db::RemoteRecordStore;
use crate::error::AuthResult;
use crate::models::scan::{new_record_id, normalize_history, prepend_scan};
use crate::models::topic::normalize_topics;
use crate::models::{Identity, InvalidScan, Role, ScanCandidate, ScanRecord, SessionState, ViewedTopic};
use crate::persistence::{keys, LocalPersistence};
use crate::services::{IdentityProvider, IdentitySubscription};
use crate::time_utils::now_millis;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use writer::{RemoteWriter, WriteJob};

/// Process-wide session authority. Cheap to clone; clones share state.
pub struct SessionStore<I, R, L> {
    inner: Arc<Inner<I, R, L>>,
}

impl<I, R, L> Clone for SessionStore<I, R, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<I, R, L> {
    identity: I,
    remote: Arc<R>,
    local: L,
    state: watch::Sender<SessionState>,
    writer: RemoteWriter,
}

impl<I, R, L> SessionStore<I, R, L>
where
    I: IdentityProvider,
    R: RemoteRecordStore,
    L: LocalPersistence,
{
    /// Build a store, seed it from local persistence, and start handling
    /// identity changes in the background.
    ///
    /// Must be called within a tokio runtime. The store starts out loading;
    /// use [`ready`](Self::ready) to wait for the first identity to resolve.
    pub fn init(identity: I, remote: R, local: L, retry: RetryPolicy) -> Self {
        let role = Role::from_stored(local.get(keys::ROLE).as_deref());
        let scans = normalize_history(load_blob(&local, keys::SCAN_HISTORY));
        let topics = normalize_topics(load_blob(&local, keys::VIEWED_TOPICS));

        tracing::info!(
            role = %role,
            scans = scans.len(),
            topics = topics.len(),
            "Session store seeded from local cache"
        );

        let (state, _) = watch::channel(SessionState::loading(role, scans, topics));
        let remote = Arc::new(remote);
        let writer = RemoteWriter::spawn(remote.clone(), retry);
        let events = identity.subscribe();

        let inner = Arc::new(Inner {
            identity,
            remote,
            local,
            state,
            writer,
        });
        tokio::spawn(drive(Arc::downgrade(&inner), events));

        Self { inner }
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Observe every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the first identity change has been handled.
    pub async fn ready(&self) -> SessionState {
        self.wait_until(|state| !state.loading).await
    }

    /// Wait until an identity change after `generation` has been handled.
    pub async fn changed_since(&self, generation: u64) -> SessionState {
        self.wait_until(|state| !state.loading && state.generation > generation)
            .await
    }

    async fn wait_until(&self, mut done: impl FnMut(&SessionState) -> bool) -> SessionState {
        let mut rx = self.inner.state.subscribe();
        let state = match rx.wait_for(|state| done(state)).await {
            Ok(state) => state.clone(),
            // Unreachable while we hold the sender
            Err(_) => self.state(),
        };
        state
    }

    /// The identity provider backing this store.
    pub fn identity_provider(&self) -> &I {
        &self.inner.identity
    }

    /// Start the provider's interactive sign-in. The new identity arrives
    /// through the identity-change handler afterwards.
    pub async fn sign_in_interactive(&self) -> AuthResult<()> {
        self.inner.identity.sign_in_interactive().await
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()> {
        self.inner
            .identity
            .sign_in_with_password(email, password)
            .await
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        self.inner.identity.sign_out().await
    }

    /// Switch persona. Persisted immediately; never synced remotely.
    pub fn set_role(&self, role: Role) {
        self.inner.persist_value(keys::ROLE, role.as_str());

        let changed = self.inner.state.send_if_modified(|state| {
            if state.role == role {
                return false;
            }
            state.role = role;
            true
        });
        if changed {
            tracing::info!(role = %role, "Role changed");
        }
    }

    /// Record a scan for the signed-in user.
    ///
    /// Returns `Ok(None)` without touching anything when nobody is signed
    /// in. The remote insert is queued; it never blocks or rolls back the
    /// local update.
    pub fn add_scan(&self, candidate: ScanCandidate) -> Result<Option<ScanRecord>, InvalidScan> {
        candidate.check()?;

        let mut added = None;
        self.inner.state.send_if_modified(|state| {
            let Some(owner) = state.identity.as_ref().map(|i| i.uid.clone()) else {
                return false;
            };

            let scan = candidate.into_record(new_record_id(), now_millis());
            state.scans = prepend_scan(&state.scans, scan.clone());
            self.inner.persist_json(keys::SCAN_HISTORY, &state.scans);
            added = Some((owner, scan));
            true
        });

        let Some((owner, scan)) = added else {
            tracing::debug!("Ignoring scan while signed out");
            return Ok(None);
        };

        tracing::info!(uid = %owner, scan_id = %scan.id, severity = scan.severity, "Scan recorded");
        self.inner.writer.enqueue(WriteJob::Scan {
            owner,
            scan: scan.clone(),
        });
        Ok(Some(scan))
    }

    /// Record a screening result, tracked only while acting as a clinician.
    pub fn record_screening(
        &self,
        candidate: ScanCandidate,
    ) -> Result<Option<ScanRecord>, InvalidScan> {
        if self.inner.state.borrow().role != Role::Clinician {
            candidate.check()?;
            tracing::debug!("Screening not tracked for patient role");
            return Ok(None);
        }
        self.add_scan(candidate)
    }

    /// Record the first view of an educational topic.
    ///
    /// Returns `None` when nobody is signed in or the topic was already viewed.
    pub fn mark_topic_viewed(&self, title: &str) -> Option<ViewedTopic> {
        let mut added = None;
        self.inner.state.send_if_modified(|state| {
            let Some(owner) = state.identity.as_ref().map(|i| i.uid.clone()) else {
                return false;
            };
            if state.topics.iter().any(|t| t.title == title) {
                return false;
            }

            let topic = ViewedTopic::new(title, now_millis());
            state.topics.insert(0, topic.clone());
            self.inner.persist_json(keys::VIEWED_TOPICS, &state.topics);
            added = Some((owner, topic));
            true
        });

        let (owner, topic) = added?;
        tracing::info!(uid = %owner, title = %topic.title, "Topic viewed");
        self.inner.writer.enqueue(WriteJob::Topic {
            owner,
            topic: topic.clone(),
        });
        Some(topic)
    }

    /// Wait for every queued remote insert to finish (or give up).
    pub async fn flush(&self) {
        self.inner.writer.flush().await;
    }
}

impl<I, R, L> Inner<I, R, L>
where
    I: IdentityProvider,
    R: RemoteRecordStore,
    L: LocalPersistence,
{
    async fn handle_identity_change(&self, identity: Option<Identity>) {
        let owner = identity.as_ref().map(|i| i.uid.clone());

        // Records present before the fetch starts; anything else in memory
        // when it completes was appended for `owner` in the meantime.
        let mut before = None;
        self.state.send_modify(|state| {
            state.identity = identity;
            before = Some(CachedKeys::of(state));
        });
        let before = before.unwrap_or_default();

        let Some(owner) = owner else {
            // Persisted blobs stay; they are replaced on the next sign-in
            self.state.send_modify(|state| {
                state.scans.clear();
                state.topics.clear();
                finish(state);
            });
            tracing::info!("Signed out, history cleared from memory");
            return;
        };

        let (scans, topics) = tokio::join!(
            self.remote.fetch_scans(&owner),
            self.remote.fetch_topics(&owner)
        );

        let scans = scans
            .map_err(|e| {
                tracing::warn!(uid = %owner, error = %e, "Failed to fetch scan history, keeping cache");
            })
            .ok();
        let topics = topics
            .map_err(|e| {
                tracing::warn!(uid = %owner, error = %e, "Failed to fetch viewed topics, keeping cache");
            })
            .ok();

        self.state.send_modify(|state| {
            if let Some(mut scans) = scans {
                scans.extend(
                    state
                        .scans
                        .iter()
                        .filter(|s| !before.scan_ids.contains(&s.id))
                        .cloned(),
                );
                state.scans = normalize_history(scans);
                self.persist_json(keys::SCAN_HISTORY, &state.scans);
            }
            if let Some(mut topics) = topics {
                topics.extend(
                    state
                        .topics
                        .iter()
                        .filter(|t| !before.topic_titles.contains(&t.title))
                        .cloned(),
                );
                state.topics = normalize_topics(topics);
                self.persist_json(keys::VIEWED_TOPICS, &state.topics);
            }
            finish(state);
        });

        let (scan_count, topic_count) = {
            let state = self.state.borrow();
            (state.scans.len(), state.topics.len())
        };
        tracing::info!(
            uid = %owner,
            scans = scan_count,
            topics = topic_count,
            "Session loaded"
        );
    }

    fn persist_value(&self, key: &str, value: &str) {
        if let Err(e) = self.local.set(key, value) {
            tracing::warn!(key, error = %e, "Failed to write local cache");
        }
    }

    fn persist_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.persist_value(key, &json),
            Err(e) => tracing::warn!(key, error = %e, "Failed to serialize local cache"),
        }
    }
}

/// Keys of the cached records at a point in time.
#[derive(Debug, Default)]
struct CachedKeys {
    scan_ids: HashSet<String>,
    topic_titles: HashSet<String>,
}

impl CachedKeys {
    fn of(state: &SessionState) -> Self {
        Self {
            scan_ids: state.scans.iter().map(|s| s.id.clone()).collect(),
            topic_titles: state.topics.iter().map(|t| t.title.clone()).collect(),
        }
    }
}

/// Mark one identity change as fully handled.
fn finish(state: &mut SessionState) {
    state.loading = false;
    state.generation += 1;
}

/// Handle identity changes one at a time, in delivery order.
///
/// Holds the store weakly so dropping the last handle stops the task.
async fn drive<I, R, L>(inner: Weak<Inner<I, R, L>>, mut events: IdentitySubscription)
where
    I: IdentityProvider,
    R: RemoteRecordStore,
    L: LocalPersistence,
{
    while let Some(identity) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_identity_change(identity).await;
    }
    tracing::debug!("Identity subscription closed");
}

/// Read a cached JSON sequence, treating absent or unreadable data as empty.
fn load_blob<T: DeserializeOwned, L: LocalPersistence>(local: &L, key: &str) -> Vec<T> {
    let Some(raw) = local.get(key) else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "Ignoring unreadable local cache");
        Vec::new()
    })
}
