// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Retina-Session: client session state for diabetic retinopathy screening
//!
//! This crate tracks who is signed in, which persona (patient or clinician)
//! they are acting as, their screening history, and which educational topics
//! they have read, keeping a local cache in sync with a remote record store.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod persistence;
pub mod services;
pub mod session;
pub mod time_utils;

pub use session::{RetryPolicy, SessionStore};
