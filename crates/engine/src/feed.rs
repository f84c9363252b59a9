//! In-process change feed
//!
//! Each `poll` registers a temporary [`Subscription`] carrying its interest
//! (key -> last known version). The write path calls
//! [`ChangeFeed::publish`] after every committed patch; a subscriber whose
//! interest matches takes the first such patch into its slot and is woken.
//!
//! ## Ordering
//!
//! A poll subscribes *before* its catch-up scan. A write that commits after
//! the subscription point is therefore delivered live, and a write that
//! commits before it is visible to the scan. Nothing falls between.
//!
//! ## Cleanup
//!
//! `Subscription` removes itself from the registry on drop, so every exit
//! path of a poll (result, timeout, error, panic) unsubscribes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use docstore_core::{Patch, Version};

/// Registry of live poll subscriptions
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: DashMap<u64, Arc<Subscriber>>,
    next_id: AtomicU64,
}

#[derive(Debug)]
struct Subscriber {
    interest: HashMap<String, Version>,
    /// First matching event, if any
    slot: Mutex<Option<(String, Patch)>>,
    ready: Condvar,
}

impl Subscriber {
    fn wants(&self, key: &str, version: &Version) -> bool {
        self.interest
            .get(key)
            .map_or(false, |known| version.is_newer_than(known))
    }

    fn offer(&self, key: &str, patch: &Patch) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some((key.to_string(), patch.clone()));
        self.ready.notify_all();
        true
    }
}

impl ChangeFeed {
    /// Create an empty feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in keys newer than the given versions
    ///
    /// Events published after this call returns are delivered to the
    /// returned subscription until it is dropped.
    pub fn subscribe(&self, interest: HashMap<String, Version>) -> Subscription<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            interest,
            slot: Mutex::new(None),
            ready: Condvar::new(),
        });
        self.subscribers.insert(id, Arc::clone(&subscriber));
        Subscription {
            feed: self,
            id,
            subscriber,
        }
    }

    /// Deliver a committed patch to every matching subscriber
    ///
    /// Returns the number of subscribers woken.
    pub fn publish(&self, key: &str, patch: &Patch) -> usize {
        // Snapshot first so no shard lock is held while waking pollers
        let targets: Vec<Arc<Subscriber>> = self
            .subscribers
            .iter()
            .filter(|entry| entry.value().wants(key, &patch.version))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let woken = targets.iter().filter(|s| s.offer(key, patch)).count();
        trace!(key, version = %patch.version, woken, "Published patch");
        woken
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// A registered interest; unsubscribes on drop
#[derive(Debug)]
pub struct Subscription<'a> {
    feed: &'a ChangeFeed,
    id: u64,
    subscriber: Arc<Subscriber>,
}

impl Subscription<'_> {
    /// Block until a matching patch arrives or `deadline` passes
    ///
    /// `None` as deadline waits without bound. Returns `None` on timeout.
    pub fn wait(&self, deadline: Option<Instant>) -> Option<(String, Patch)> {
        let mut slot = self.subscriber.slot.lock();
        while slot.is_none() {
            match deadline {
                Some(deadline) => {
                    if self
                        .subscriber
                        .ready
                        .wait_until(&mut slot, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.subscriber.ready.wait(&mut slot),
            }
        }
        slot.take()
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.feed.subscribers.remove(&self.id);
    }
}
