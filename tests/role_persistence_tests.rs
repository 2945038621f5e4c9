// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role preference and cache survival across restarts.

use retina_session::models::{Role, ScanCandidate};
use retina_session::persistence::{keys, FilePersistence, LocalPersistence, MemoryPersistence};
use retina_session::SessionStore;
use std::sync::Arc;

mod common;
use common::{fast_retry, start_store, test_user, FakeIdentityProvider, FakeRecordStore};

#[tokio::test]
async fn test_role_survives_restart() {
    for role in [Role::Patient, Role::Clinician] {
        let remote = FakeRecordStore::new();
        let local = Arc::new(MemoryPersistence::new());

        let store = start_store(FakeIdentityProvider::signed_out(), &remote, &local).await;
        store.set_role(role);
        assert_eq!(store.state().role, role);
        drop(store);

        let restarted = start_store(FakeIdentityProvider::signed_out(), &remote, &local).await;
        assert_eq!(restarted.state().role, role);
    }
}

#[tokio::test]
async fn test_role_defaults_to_patient() {
    let remote = FakeRecordStore::new();
    let local = Arc::new(MemoryPersistence::new());
    local.set(keys::ROLE, "administrator").unwrap();

    let store = start_store(FakeIdentityProvider::signed_out(), &remote, &local).await;
    assert_eq!(store.state().role, Role::Patient);
}

#[tokio::test]
async fn test_set_role_is_idempotent_and_survives_sign_out() {
    let remote = FakeRecordStore::new();
    let local = Arc::new(MemoryPersistence::new());
    let store = start_store(
        FakeIdentityProvider::signed_in(test_user("u1")),
        &remote,
        &local,
    )
    .await;

    let mut rx = store.subscribe();
    let _ = rx.borrow_and_update();

    store.set_role(Role::Clinician);
    assert!(rx.has_changed().unwrap());
    let _ = rx.borrow_and_update();

    store.set_role(Role::Clinician);
    assert!(!rx.has_changed().unwrap());

    let generation = store.state().generation;
    store.sign_out().await.unwrap();
    let state = store.changed_since(generation).await;
    assert_eq!(state.role, Role::Clinician);
    assert_eq!(local.get(keys::ROLE).as_deref(), Some("clinician"));
    assert_eq!(remote.insert_attempts(), 0);
}

#[tokio::test]
async fn test_file_cache_restores_session_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    {
        let local = Arc::new(FilePersistence::open(&path).unwrap());
        let store = SessionStore::init(
            FakeIdentityProvider::signed_in(test_user("u1")),
            FakeRecordStore::new(),
            local,
            fast_retry(),
        );
        store.ready().await;
        store.set_role(Role::Clinician);
        store
            .add_scan(ScanCandidate::new("Mild DR", 0.6, 1))
            .unwrap()
            .unwrap();
        store.mark_topic_viewed("Stages of Progression").unwrap();
        store.flush().await;
    }

    // Remote unreachable on the next run: the cache is all we have
    let remote = FakeRecordStore::new();
    remote.set_fail_reads(true);
    let store = SessionStore::init(
        FakeIdentityProvider::signed_in(test_user("u1")),
        remote,
        Arc::new(FilePersistence::open(&path).unwrap()),
        fast_retry(),
    );
    let state = store.ready().await;

    assert_eq!(state.role, Role::Clinician);
    assert_eq!(state.scans.len(), 1);
    assert_eq!(state.scans[0].label, "Mild DR");
    assert_eq!(state.topics.len(), 1);
}
