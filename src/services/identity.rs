// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider seam and identity-change fan-out.

use crate::error::AuthResult;
use crate::models::Identity;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// External identity provider (sign-in, sign-out, identity-change events).
pub trait IdentityProvider: Send + Sync + 'static {
    /// Subscribe to identity changes.
    ///
    /// The first event is the current identity, delivered as soon as the
    /// provider has resolved it. Dropping the subscription unsubscribes.
    fn subscribe(&self) -> IdentitySubscription;

    /// Run the provider's interactive sign-in flow.
    fn sign_in_interactive(&self) -> impl Future<Output = AuthResult<()>> + Send;

    /// Sign in with email and password.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<()>> + Send;

    /// Sign the current user out.
    fn sign_out(&self) -> impl Future<Output = AuthResult<()>> + Send;
}

/// Stream of identity changes for one subscriber, in delivery order.
#[derive(Debug)]
pub struct IdentitySubscription {
    rx: mpsc::UnboundedReceiver<Option<Identity>>,
}

impl IdentitySubscription {
    /// Next identity change, or `None` once the provider is gone.
    pub async fn recv(&mut self) -> Option<Option<Identity>> {
        self.rx.recv().await
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {}
}

#[derive(Debug, Default)]
struct BroadcastState {
    /// `None` until the provider has resolved the initial identity
    current: Option<Option<Identity>>,
    subscribers: Vec<mpsc::UnboundedSender<Option<Identity>>>,
}

/// Fans identity changes out to subscribers.
///
/// Providers own one of these and call [`publish`](Self::publish) on every
/// sign-in/sign-out. Subscribers that join late receive the latest identity
/// first. Nothing is delivered until the first publish.
#[derive(Debug, Default)]
pub struct IdentityBroadcaster {
    state: Mutex<BroadcastState>,
}

impl IdentityBroadcaster {
    /// Broadcaster whose initial identity is not known yet.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Broadcaster that already knows the current identity.
    pub fn resolved(identity: Option<Identity>) -> Self {
        let broadcaster = Self::default();
        broadcaster.lock().current = Some(identity);
        broadcaster
    }

    fn lock(&self) -> MutexGuard<'_, BroadcastState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> IdentitySubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if let Some(current) = &state.current {
            // Receiver is alive: we are holding it
            let _ = tx.send(current.clone());
        }
        state.subscribers.push(tx);
        IdentitySubscription { rx }
    }

    /// Record a new identity and deliver it to every live subscriber.
    pub fn publish(&self, identity: Option<Identity>) {
        let mut state = self.lock();
        state.current = Some(identity.clone());
        state
            .subscribers
            .retain(|tx| tx.send(identity.clone()).is_ok());

        tracing::debug!(
            uid = identity.as_ref().map(|i| i.uid.as_str()).unwrap_or("<none>"),
            subscribers = state.subscribers.len(),
            "Identity change published"
        );
    }

    /// Latest published identity, or `None` if unresolved or signed out.
    pub fn current(&self) -> Option<Identity> {
        self.lock().current.clone().flatten()
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unresolved_broadcaster_waits_for_first_publish() {
        let broadcaster = IdentityBroadcaster::unresolved();
        let mut sub = broadcaster.subscribe();
        assert!(sub.rx.try_recv().is_err());

        broadcaster.publish(Some(Identity::new("u1")));
        assert_eq!(sub.recv().await, Some(Some(Identity::new("u1"))));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_current_then_changes_in_order() {
        let broadcaster = IdentityBroadcaster::resolved(Some(Identity::new("u1")));
        let mut sub = broadcaster.subscribe();

        broadcaster.publish(None);
        broadcaster.publish(Some(Identity::new("u2")));

        assert_eq!(sub.recv().await, Some(Some(Identity::new("u1"))));
        assert_eq!(sub.recv().await, Some(None));
        assert_eq!(sub.recv().await, Some(Some(Identity::new("u2"))));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let broadcaster = IdentityBroadcaster::resolved(None);
        let sub = broadcaster.subscribe();
        sub.unsubscribe();

        broadcaster.publish(Some(Identity::new("u1")));
        assert!(broadcaster.lock().subscribers.is_empty());
        assert_eq!(broadcaster.current(), Some(Identity::new("u1")));
    }
}
