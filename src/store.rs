//! Notification store, the single in-memory authority for the notification
//! list and unread count that every surface renders.
//!
//! Merge rules:
//! - push: de-duplicate by id, prepend, count the new entry if unread
//! - poll: replace list and count wholesale; the last poll always wins over
//!   any optimistic local mutation made since the previous one
//! - mark one / mark all: local read-state changes, count floored at zero
//! - reset: clear everything and start a new generation; a refresh fetched
//!   under an older generation is discarded when it lands
//!
//! State lives in a `watch` channel so every mutation is one atomic step that
//! all subscribers observe identically. Mutations are synchronous; none of
//! them await while holding the state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::models::{Notification, NotificationId};

/// Capacity of the arrival signal. Slow toast consumers lag instead of
/// blocking the push path.
const ARRIVAL_CAPACITY: usize = 64;

/// What surfaces see: the list (newest first, unique by id) and the count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

impl NotificationState {
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.notifications.iter().find(|n| &n.id == id)
    }

    /// Unread entries in the visible window. May be lower than
    /// `unread_count`, which also covers entries beyond the fetched page.
    pub fn unread_in_view(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

/// Shared, cheaply-cloneable store handle.
#[derive(Clone)]
pub struct NotificationStore {
    state: Arc<watch::Sender<NotificationState>>,
    arrivals: broadcast::Sender<Notification>,
    generation: Arc<AtomicU64>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(NotificationState::default());
        let (arrivals, _) = broadcast::channel(ARRIVAL_CAPACITY);
        Self {
            state: Arc::new(state),
            arrivals,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Prepend a pushed notification unless its id is already held.
    /// Returns `true` when the list changed.
    pub fn apply_push_event(&self, notification: Notification) -> bool {
        let mut inserted = None;
        self.state.send_if_modified(|s| {
            if s.notifications.iter().any(|n| n.id == notification.id) {
                return false;
            }
            if !notification.is_read {
                s.unread_count += 1;
            }
            s.notifications.insert(0, notification.clone());
            inserted = Some(notification.clone());
            true
        });

        match inserted {
            Some(n) => {
                debug!(id = %n.id, "push applied");
                // No subscribers is fine: nobody is showing toasts.
                let _ = self.arrivals.send(n);
                true
            }
            None => {
                debug!(id = %notification.id, "duplicate push ignored");
                false
            }
        }
    }

    /// Replace list and count with a freshly polled page and total.
    pub fn apply_poll_refresh(&self, notifications: Vec<Notification>, unread_total: u64) {
        self.replace(None, notifications, unread_total);
    }

    /// Like [`apply_poll_refresh`](Self::apply_poll_refresh), but only if no
    /// [`reset`](Self::reset) happened since `generation` was read. Returns
    /// `false` for a stale refresh.
    pub fn apply_poll_refresh_for(
        &self,
        generation: u64,
        notifications: Vec<Notification>,
        unread_total: u64,
    ) -> bool {
        self.replace(Some(generation), notifications, unread_total)
    }

    fn replace(&self, expected: Option<u64>, notifications: Vec<Notification>, unread_total: u64) -> bool {
        let mut seen = HashSet::with_capacity(notifications.len());
        let notifications: Vec<Notification> = notifications
            .into_iter()
            .filter(|n| seen.insert(n.id.clone()))
            .collect();

        let mut stale = false;
        // The generation is read under the state lock, the same lock `reset`
        // bumps it under.
        let changed = self.state.send_if_modified(|s| {
            if let Some(expected) = expected {
                if self.generation.load(Ordering::SeqCst) != expected {
                    stale = true;
                    return false;
                }
            }
            if s.notifications == notifications && s.unread_count == unread_total {
                return false;
            }
            s.notifications = notifications;
            s.unread_count = unread_total;
            true
        });

        if stale {
            debug!(generation = ?expected, "stale poll refresh discarded");
            return false;
        }
        debug!(unread = unread_total, changed, "poll refresh applied");
        true
    }

    /// Current generation; pair with [`apply_poll_refresh_for`](Self::apply_poll_refresh_for).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drop everything and invalidate refreshes still in flight.
    pub fn reset(&self) {
        self.state.send_if_modified(|s| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            let changed = !s.notifications.is_empty() || s.unread_count != 0;
            s.notifications.clear();
            s.unread_count = 0;
            changed
        });
    }

    /// Mark one entry read.
    ///
    /// An unread entry flips and the count drops by one. An entry already read
    /// is left alone. An id outside the fetched window still lowers the count
    /// (it is counted remotely), never below zero.
    pub fn mark_one_read(&self, id: &NotificationId) -> bool {
        self.state.send_if_modified(|s| {
            match s.notifications.iter_mut().find(|n| &n.id == id) {
                Some(n) if n.is_read => false,
                Some(n) => {
                    n.is_read = true;
                    s.unread_count = s.unread_count.saturating_sub(1);
                    true
                }
                None if s.unread_count > 0 => {
                    s.unread_count -= 1;
                    true
                }
                None => false,
            }
        })
    }

    /// Every entry read, count zero.
    pub fn mark_all_read(&self) -> bool {
        self.state.send_if_modified(|s| {
            let changed = s.unread_count != 0 || s.notifications.iter().any(|n| !n.is_read);
            for n in s.notifications.iter_mut() {
                n.is_read = true;
            }
            s.unread_count = 0;
            changed
        })
    }

    pub fn snapshot(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    pub fn unread_count(&self) -> u64 {
        self.state.borrow().unread_count
    }

    /// Observe state changes. Each surface holds its own receiver.
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    /// Transient "notification arrived" signal, separate from the list.
    pub fn arrivals(&self) -> broadcast::Receiver<Notification> {
        self.arrivals.subscribe()
    }
}
