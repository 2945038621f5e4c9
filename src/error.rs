// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the session layer and its collaborators.
//!
//! None of these are fatal: auth failures go back to the caller, remote
//! store and local persistence failures are logged and absorbed by the
//! session store.

/// Identity provider failures, returned to callers of sign-in/sign-out.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Sign-in was cancelled")]
    Cancelled,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email is already in use")]
    EmailInUse,

    #[error("Password should be at least 6 characters")]
    WeakPassword,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Whether the failure means the stored session can never be restored.
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, AuthError::SessionExpired)
    }
}

/// Remote record store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Remote store not connected")]
    NotConnected,

    #[error("Remote store request failed: {0}")]
    Transport(String),

    #[error("Remote store rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to decode remote records: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether repeating the same request could succeed.
    ///
    /// Client errors (bad row, duplicate key, auth) are final. Firestore
    /// writes are keyed upserts, so its errors are always safe to repeat.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::NotConnected | StoreError::Transport(_) | StoreError::Database(_) => true,
            StoreError::Rejected { status, .. } => *status >= 500 || *status == 429,
            StoreError::Decode(_) => false,
        }
    }
}

/// Local persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Local storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for identity operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result type alias for remote store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
