//! Replay channel — broadcast with last-value memory.
//!
//! DESIGN
//! ======
//! Each subscriber owns a one-slot `watch` mailbox: delivery overwrites
//! whatever the subscriber has not read yet, so an idle subscriber holds
//! at most the newest item. `publish` stores the value as the latest and
//! delivers it to every live subscriber; `subscribe` seeds a new mailbox
//! with the stored value. Both happen under one short lock, so a
//! subscriber sees a value published concurrently with its subscription
//! exactly once, either as the replay or as a delivery.
//!
//! `broadcast` delivers a transient item without caching it (used for
//! per-attempt fetch errors).
//!
//! Dropped subscriptions are pruned on the next delivery.

use std::sync::{Mutex, PoisonError};

use futures_util::Stream;
use tokio::sync::watch;

#[cfg(test)]
#[path = "replay_test.rs"]
mod tests;

pub struct ReplayChannel<T> {
    inner: Mutex<ReplayInner<T>>,
}

struct ReplayInner<T> {
    latest: Option<T>,
    subscribers: Vec<watch::Sender<Option<T>>>,
    closed: bool,
}

impl<T: Clone> ReplayChannel<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(ReplayInner { latest: None, subscribers: Vec::new(), closed: false }) }
    }

    /// Register a subscriber, replaying the latest value if there is one.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = watch::channel(None);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latest) = &inner.latest {
            // Bumps the version so the receiver sees it as unread.
            tx.send_replace(Some(latest.clone()));
        }
        // A closed channel still replays but never delivers again.
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        Subscription { rx }
    }

    /// Store `value` as the latest and deliver it to all subscribers.
    pub fn publish(&self, value: T) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.retain(|tx| tx.send(Some(value.clone())).is_ok());
        inner.latest = Some(value);
    }

    /// Deliver `item` to current subscribers without caching it.
    pub fn broadcast(&self, item: T) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.retain(|tx| tx.send(Some(item.clone())).is_ok());
    }

    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).latest.clone()
    }

    /// Number of subscriptions that have not been dropped.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    /// Release every subscriber. Their streams end after the unread item.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.closed = true;
        inner.subscribers.clear();
    }
}

impl<T: Clone> Default for ReplayChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Receiving end of a [`ReplayChannel`]. Dropping it unsubscribes.
pub struct Subscription<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next unread item. `None` once the channel is closed and
    /// the unread item, if any, has been taken.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// Take the unread item without waiting. Always `None` after close.
    pub fn try_next(&mut self) -> Option<T> {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            Ok(false) | Err(_) => None,
        }
    }

    /// Adapt into a [`Stream`] for combinator-style consumers.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures_util::stream::unfold(self, |mut sub| async move { sub.next().await.map(|item| (item, sub)) })
    }
}
