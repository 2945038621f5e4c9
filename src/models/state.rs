// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session snapshot published to observers, and views derived from it.

use crate::models::{Identity, Role, ScanRecord, ViewedTopic};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Knowledge points awarded per viewed topic.
pub const POINTS_PER_TOPIC: usize = 10;

/// Everything the session store knows, as one immutable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionState {
    /// Signed-in user. Indeterminate while `loading` is true.
    pub identity: Option<Identity>,
    /// True until the first identity change has been handled
    pub loading: bool,
    /// Active persona
    pub role: Role,
    /// Scan history, newest first
    pub scans: Vec<ScanRecord>,
    /// Viewed topics, newest first
    pub topics: Vec<ViewedTopic>,
    /// Number of identity changes fully handled
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub generation: u64,
}

impl SessionState {
    /// Initial state before the identity provider has reported anything.
    pub fn loading(role: Role, scans: Vec<ScanRecord>, topics: Vec<ViewedTopic>) -> Self {
        Self {
            identity: None,
            loading: true,
            role,
            scans,
            topics,
            generation: 0,
        }
    }

    /// Signed-in user, only once loading has finished.
    pub fn user(&self) -> Option<&Identity> {
        if self.loading {
            return None;
        }
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// Whether a protected page may be shown.
    pub fn admission(&self) -> Admission {
        if self.loading {
            Admission::Pending
        } else if self.identity.is_some() {
            Admission::Allowed
        } else {
            Admission::RedirectToLogin
        }
    }

    /// Dashboard figures for the active role.
    pub fn summary(&self) -> ProfileSummary {
        match self.role {
            Role::Clinician => {
                let average_confidence = if self.scans.is_empty() {
                    0.0
                } else {
                    self.scans.iter().map(|s| s.confidence).sum::<f64>() / self.scans.len() as f64
                };
                ProfileSummary::Clinician {
                    scans_performed: self.scans.len(),
                    average_confidence,
                }
            }
            Role::Patient => ProfileSummary::Patient {
                knowledge_points: self.topics.len() * POINTS_PER_TOPIC,
                latest_severity: self.scans.first().map(|s| s.severity),
            },
        }
    }
}

/// Outcome of a route guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Identity not resolved yet; show a spinner
    Pending,
    Allowed,
    RedirectToLogin,
}

/// Role-specific profile statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ProfileSummary {
    Clinician {
        #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
        scans_performed: usize,
        /// Mean confidence across the history, in [0, 1]
        average_confidence: f64,
    },
    Patient {
        #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
        knowledge_points: usize,
        /// Severity of the most recent scan, if any
        latest_severity: Option<u32>,
    },
}
