// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Screening scan records kept in the user's history.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Maximum number of scans kept in a user's history.
pub const SCAN_HISTORY_LIMIT: usize = 50;

/// One completed screening result.
///
/// Never mutated after creation; only prepended or evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScanRecord {
    /// Random alphanumeric ID, unique within the owner's history
    pub id: String,
    /// When the scan was recorded (epoch millis)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub timestamp: i64,
    /// Classifier label (e.g. "Moderate DR")
    pub label: String,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    /// Retinopathy severity grade (0 = no DR)
    pub severity: u32,
}

/// A screening result about to be added to the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ScanCandidate {
    #[validate(length(min = 1))]
    pub label: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    pub severity: u32,
}

/// Why a scan candidate was refused.
#[derive(Debug, thiserror::Error)]
pub enum InvalidScan {
    #[error("Confidence must be a finite number")]
    NonFiniteConfidence,

    #[error("Invalid scan: {0}")]
    Rejected(#[from] validator::ValidationErrors),
}

impl ScanCandidate {
    pub fn new(label: impl Into<String>, confidence: f64, severity: u32) -> Self {
        Self {
            label: label.into(),
            confidence,
            severity,
        }
    }

    /// Validate the candidate before it touches any state.
    pub fn check(&self) -> Result<(), InvalidScan> {
        // range() lets NaN through
        if !self.confidence.is_finite() {
            return Err(InvalidScan::NonFiniteConfidence);
        }
        self.validate()?;
        Ok(())
    }

    /// Stamp the candidate with an ID and timestamp.
    pub fn into_record(self, id: String, timestamp: i64) -> ScanRecord {
        ScanRecord {
            id,
            timestamp,
            label: self.label,
            confidence: self.confidence,
            severity: self.severity,
        }
    }
}

/// Generate a new record ID.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Bring a history into canonical shape: newest first, unique IDs, capped.
///
/// The sort is stable, so records with equal timestamps keep their order.
pub fn normalize_history(mut scans: Vec<ScanRecord>) -> Vec<ScanRecord> {
    scans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen = HashSet::new();
    scans.retain(|scan| seen.insert(scan.id.clone()));
    scans.truncate(SCAN_HISTORY_LIMIT);
    scans
}

/// Prepend a new scan, evicting the oldest entries over the limit.
pub fn prepend_scan(history: &[ScanRecord], scan: ScanRecord) -> Vec<ScanRecord> {
    std::iter::once(scan)
        .chain(history.iter().cloned())
        .take(SCAN_HISTORY_LIMIT)
        .collect()
}
