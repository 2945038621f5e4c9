// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the session layer.

pub mod role;
pub mod scan;
pub mod state;
pub mod topic;
pub mod user;

pub use role::Role;
pub use scan::{InvalidScan, ScanCandidate, ScanRecord, SCAN_HISTORY_LIMIT};
pub use state::{Admission, ProfileSummary, SessionState};
pub use topic::{ViewedTopic, EDUCATION_TOPICS};
pub use user::Identity;
