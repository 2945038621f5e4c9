// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use retina_session::db::RemoteRecordStore;
use retina_session::error::{AuthError, AuthResult, StoreError, StoreResult};
use retina_session::models::{Identity, ScanRecord, ViewedTopic};
use retina_session::persistence::MemoryPersistence;
use retina_session::services::{IdentityBroadcaster, IdentityProvider, IdentitySubscription};
use retina_session::{RetryPolicy, SessionStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

#[allow(dead_code)]
pub type TestStore = SessionStore<FakeIdentityProvider, Arc<FakeRecordStore>, Arc<MemoryPersistence>>;

/// Identity with a predictable profile.
#[allow(dead_code)]
pub fn test_user(uid: &str) -> Identity {
    Identity {
        uid: uid.to_string(),
        display_name: Some(format!("User {uid}")),
        email: Some(format!("{uid}@example.com")),
        photo_url: None,
        created_at: Some("2024-01-01T00:00:00Z".to_string()),
    }
}

#[allow(dead_code)]
pub fn scan(id: &str, timestamp: i64) -> ScanRecord {
    ScanRecord {
        id: id.to_string(),
        timestamp,
        label: "Moderate DR".to_string(),
        confidence: 0.9,
        severity: 2,
    }
}

/// Retry fast enough for tests.
#[allow(dead_code)]
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
    }
}

/// Start a store and wait until it has handled the initial identity.
#[allow(dead_code)]
pub async fn start_store(
    identity: FakeIdentityProvider,
    remote: &Arc<FakeRecordStore>,
    local: &Arc<MemoryPersistence>,
) -> TestStore {
    let store = SessionStore::init(identity, remote.clone(), local.clone(), fast_retry());
    store.ready().await;
    store
}

/// Identity provider driven by the test.
#[allow(dead_code)]
pub struct FakeIdentityProvider {
    events: IdentityBroadcaster,
    next_user: Mutex<Identity>,
    next_error: Mutex<Option<AuthError>>,
}

#[allow(dead_code)]
impl FakeIdentityProvider {
    fn with_events(events: IdentityBroadcaster) -> Self {
        Self {
            events,
            next_user: Mutex::new(test_user("u1")),
            next_error: Mutex::new(None),
        }
    }

    pub fn signed_out() -> Self {
        Self::with_events(IdentityBroadcaster::resolved(None))
    }

    pub fn signed_in(identity: Identity) -> Self {
        let provider = Self::with_events(IdentityBroadcaster::resolved(Some(identity.clone())));
        provider.set_next_user(identity);
        provider
    }

    /// Provider that has not reported the startup identity yet.
    pub fn unresolved() -> Self {
        Self::with_events(IdentityBroadcaster::unresolved())
    }

    /// Who the next interactive sign-in produces.
    pub fn set_next_user(&self, identity: Identity) {
        *self.next_user.lock().unwrap() = identity;
    }

    /// Make the next sign-in or sign-out fail.
    pub fn fail_next(&self, error: AuthError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Simulate an identity change originating outside the store.
    pub fn publish(&self, identity: Option<Identity>) {
        self.events.publish(identity);
    }

    fn take_error(&self) -> AuthResult<()> {
        match self.next_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl IdentityProvider for FakeIdentityProvider {
    fn subscribe(&self) -> IdentitySubscription {
        self.events.subscribe()
    }

    async fn sign_in_interactive(&self) -> AuthResult<()> {
        self.take_error()?;
        let identity = self.next_user.lock().unwrap().clone();
        self.events.publish(Some(identity));
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()> {
        self.take_error()?;
        if password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let mut identity = Identity::new(format!("uid-{email}"));
        identity.email = Some(email.to_string());
        self.events.publish(Some(identity));
        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.take_error()?;
        self.events.publish(None);
        Ok(())
    }
}

/// In-memory record store with failure injection.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeRecordStore {
    scans: Mutex<HashMap<String, Vec<ScanRecord>>>,
    topics: Mutex<HashMap<String, Vec<ViewedTopic>>>,
    fail_reads: AtomicBool,
    /// Number of upcoming inserts that fail
    failing_inserts: AtomicU32,
    insert_attempts: AtomicU32,
    /// Delay between reading the rows and returning them
    read_delay: Mutex<Duration>,
}

#[allow(dead_code)]
impl FakeRecordStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_scans(&self, owner: &str, scans: Vec<ScanRecord>) {
        self.scans.lock().unwrap().insert(owner.to_string(), scans);
    }

    pub fn seed_topics(&self, owner: &str, topics: Vec<ViewedTopic>) {
        self.topics.lock().unwrap().insert(owner.to_string(), topics);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }

    pub fn fail_next_inserts(&self, count: u32) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    pub fn stored_scans(&self, owner: &str) -> Vec<ScanRecord> {
        self.scans.lock().unwrap().get(owner).cloned().unwrap_or_default()
    }

    pub fn stored_topics(&self, owner: &str) -> Vec<ViewedTopic> {
        self.topics.lock().unwrap().get(owner).cloned().unwrap_or_default()
    }

    /// Inserts tried so far, failed ones included.
    pub fn insert_attempts(&self) -> u32 {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    async fn read_pause(&self) {
        let delay = *self.read_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_insert(&self) -> StoreResult<()> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteRecordStore for FakeRecordStore {
    async fn fetch_scans(&self, owner: &str) -> StoreResult<Vec<ScanRecord>> {
        self.check_read()?;
        let scans = self.stored_scans(owner);
        self.read_pause().await;
        Ok(scans)
    }

    async fn fetch_topics(&self, owner: &str) -> StoreResult<Vec<ViewedTopic>> {
        self.check_read()?;
        let topics = self.stored_topics(owner);
        self.read_pause().await;
        Ok(topics)
    }

    async fn insert_scan(&self, owner: &str, scan: &ScanRecord) -> StoreResult<()> {
        self.check_insert()?;
        self.scans
            .lock()
            .unwrap()
            .entry(owner.to_string())
            .or_default()
            .insert(0, scan.clone());
        Ok(())
    }

    async fn insert_topic(&self, owner: &str, topic: &ViewedTopic) -> StoreResult<()> {
        self.check_insert()?;
        self.topics
            .lock()
            .unwrap()
            .entry(owner.to_string())
            .or_default()
            .push(topic.clone());
        Ok(())
    }
}
