//! Read-state synchronizer.
//!
//! Every gesture mutates the store first, then writes to the remote API.
//! A failed write leaves the optimistic state in place and is returned to the
//! caller for reporting; the next poll refresh is authoritative either way.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::api::NotificationApi;
use crate::errors::Result;
use crate::models::{Notification, NotificationId};
use crate::store::{NotificationState, NotificationStore};

/// Routing collaborator used when a notification carries a deep link.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, path: &str) {
        self(path)
    }
}

#[derive(Clone)]
pub struct ReadStateSync {
    store: NotificationStore,
    api: Arc<dyn NotificationApi>,
}

impl ReadStateSync {
    pub fn new(store: NotificationStore, api: Arc<dyn NotificationApi>) -> Self {
        Self { store, api }
    }

    pub async fn mark_as_read(&self, id: &NotificationId) -> Result<()> {
        self.store.mark_one_read(id);
        self.api.mark_read(id).await.map_err(|e| {
            warn!(id = %id, error = %e, "mark as read failed; keeping local state until next poll");
            e
        })
    }

    pub async fn mark_all_as_read(&self) -> Result<()> {
        self.store.mark_all_read();
        self.api.mark_all_read().await.map_err(|e| {
            warn!(error = %e, "mark all as read failed; keeping local state until next poll");
            e
        })
    }

    /// Click on a notification entry: mark everything read, then follow the
    /// deep link without waiting for the remote write. The returned handle
    /// resolves with the write's outcome.
    pub fn open_entry(
        &self,
        notification: &Notification,
        navigator: &dyn Navigator,
    ) -> JoinHandle<Result<()>> {
        self.store.mark_all_read();

        let api = self.api.clone();
        let write = tokio::spawn(async move {
            api.mark_all_read().await.map_err(|e| {
                warn!(error = %e, "mark all as read failed after entry click");
                e
            })
        });

        if let Some(path) = notification.path.as_deref() {
            navigator.navigate(path);
        }
        write
    }

    /// Read-only view for surfaces; they never get the store itself.
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.store.subscribe()
    }
}
