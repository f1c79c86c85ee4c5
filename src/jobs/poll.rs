//! Background job: fallback poll of the notification page and unread total.
//!
//! Ticks every `interval` (first tick immediately). Each tick's fetch runs
//! concurrently with later ticks; there is no overlap guard, a slow response
//! just lands late and the store applies it like any other refresh. A failed
//! fetch skips that tick's refresh and the interval carries on.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::NotificationApi;
use crate::store::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub page_size: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            page_size: 20,
        }
    }
}

/// Running poll loop. Dropping the handle cancels it; `stop()` also waits
/// until no fetch can land any more.
pub struct PollHandle {
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn the poll loop. In-flight fetches live inside the loop task, so
/// cancelling it cancels them too.
pub fn spawn(api: Arc<dyn NotificationApi>, store: NotificationStore, config: PollConfig) -> PollHandle {
    let task = tokio::spawn(async move {
        let mut interval = time::interval(config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inflight = FuturesUnordered::new();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    inflight.push(refresh_once(api.as_ref(), &store, config.page_size));
                }
                Some(_) = inflight.next(), if !inflight.is_empty() => {}
            }
        }
    });

    debug!(
        interval_ms = config.interval.as_millis() as u64,
        page_size = config.page_size,
        "notification poll started"
    );
    PollHandle { task: Some(task) }
}

/// On-demand refresh outside the interval, e.g. when a notifications page
/// opens.
#[derive(Clone)]
pub struct Refresher {
    api: Arc<dyn NotificationApi>,
    store: NotificationStore,
    page_size: u32,
}

impl Refresher {
    pub fn new(api: Arc<dyn NotificationApi>, store: NotificationStore, page_size: u32) -> Self {
        Self { api, store, page_size }
    }

    pub async fn refresh(&self) -> bool {
        refresh_once(self.api.as_ref(), &self.store, self.page_size).await
    }
}

/// Fetch the first page and the unread total concurrently and hand both to
/// the store as one refresh. Returns `false` when either fetch failed or the
/// store was reset (session ended) while the fetch was in flight; in both
/// cases the store is untouched.
pub async fn refresh_once(api: &dyn NotificationApi, store: &NotificationStore, page_size: u32) -> bool {
    let generation = store.generation();
    let (page, unread) = tokio::join!(api.fetch_page(0, page_size), api.unread_count());

    match (page, unread) {
        (Ok(notifications), Ok(total)) => {
            debug!(entries = notifications.len(), unread = total, "poll refresh fetched");
            store.apply_poll_refresh_for(generation, notifications, total)
        }
        (page, unread) => {
            if let Err(e) = page {
                warn!(error = %e, "notification page fetch failed");
            }
            if let Err(e) = unread {
                warn!(error = %e, "unread count fetch failed");
            }
            false
        }
    }
}
