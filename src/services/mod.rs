// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - identity provider integrations.

pub mod firebase_auth;
pub mod identity;

pub use firebase_auth::{FirebaseAuth, InteractivePrompt, SignUpRequest};
pub use identity::{IdentityBroadcaster, IdentityProvider, IdentitySubscription};
