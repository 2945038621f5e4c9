// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use retina_session::error::{AuthError, StoreError};

#[test]
fn test_session_rejected_matches() {
    assert!(AuthError::SessionExpired.is_session_rejected());
}

#[test]
fn test_session_rejected_no_match() {
    assert!(!AuthError::Unavailable("timeout".to_string()).is_session_rejected());
    assert!(!AuthError::InvalidCredentials.is_session_rejected());
    assert!(!AuthError::Cancelled.is_session_rejected());
}

#[test]
fn test_error_messages() {
    assert_eq!(
        AuthError::WeakPassword.to_string(),
        "Password should be at least 6 characters"
    );
    assert_eq!(
        StoreError::Rejected {
            status: 401,
            body: "JWT expired".to_string()
        }
        .to_string(),
        "Remote store rejected request (HTTP 401): JWT expired"
    );
}

fn rejected(status: u16) -> StoreError {
    StoreError::Rejected {
        status,
        body: String::new(),
    }
}

#[test]
fn test_store_error_retryable() {
    assert!(StoreError::Transport("timed out".to_string()).is_retryable());
    assert!(StoreError::NotConnected.is_retryable());
    assert!(rejected(503).is_retryable());
    assert!(rejected(429).is_retryable());
}

#[test]
fn test_store_error_not_retryable() {
    assert!(!rejected(400).is_retryable());
    assert!(!rejected(401).is_retryable());
    assert!(!rejected(409).is_retryable());
    assert!(!StoreError::Decode("missing field `id`".to_string()).is_retryable());
}
