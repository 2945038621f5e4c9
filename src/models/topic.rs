// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Educational topics the user has opened.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Titles of the education sections, in display order.
pub const EDUCATION_TOPICS: [&str; 6] = [
    "What is Diabetic Retinopathy?",
    "Stages of Progression",
    "Experience the Impact: Vision Simulation",
    "Symptoms & Early Signs",
    "Prevention & Care",
    "Frequently Asked Questions",
];

/// Look up an education topic title by its display position.
pub fn topic_by_index(index: usize) -> Option<&'static str> {
    EDUCATION_TOPICS.get(index).copied()
}

/// First view of an educational topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ViewedTopic {
    /// Topic title, unique within the owner's list
    pub title: String,
    /// When the topic was first opened (epoch millis)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub timestamp: i64,
}

impl ViewedTopic {
    pub fn new(title: impl Into<String>, timestamp: i64) -> Self {
        Self {
            title: title.into(),
            timestamp,
        }
    }
}

/// Collapse duplicate titles (earliest view wins) and order newest first.
pub fn normalize_topics(topics: Vec<ViewedTopic>) -> Vec<ViewedTopic> {
    let mut earliest: HashMap<String, ViewedTopic> = HashMap::new();
    for topic in topics {
        match earliest.get(&topic.title) {
            Some(existing) if existing.timestamp <= topic.timestamp => {}
            _ => {
                earliest.insert(topic.title.clone(), topic);
            }
        }
    }

    let mut topics: Vec<ViewedTopic> = earliest.into_values().collect();
    topics.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.title.cmp(&b.title))
    });
    topics
}
