//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Notify;

use storefront_notify::api::NotificationApi;
use storefront_notify::models::{Notification, NotificationId, NotificationKind};
use storefront_notify::{NotifyError, Result};

pub fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 10)
        .unwrap()
        .and_hms_opt(10, minute, 0)
        .unwrap()
}

pub fn notif(id: i64, is_read: bool) -> Notification {
    Notification {
        id: NotificationId::from(id),
        kind: NotificationKind::NewOrder,
        title: format!("Order #{}", id),
        message: "A new order was placed".into(),
        created_at: at((id % 60) as u32),
        path: Some(format!("/admin/orders/{}", id)),
        is_read,
    }
}

/// In-memory remote with failure switches and call counters.
#[derive(Default)]
pub struct FakeApi {
    page: Mutex<Vec<Notification>>,
    unread: Mutex<u64>,
    pub fail_fetch: AtomicBool,
    pub fail_count: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub mark_read_calls: AtomicUsize,
    pub mark_all_calls: AtomicUsize,
    held: Mutex<Option<Arc<Notify>>>,
    fetch_delay: Mutex<Duration>,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: AtomicUsize,
}

/// Counts a running `fetch_page`; dropping the future counts as finishing.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeApi {
    pub fn with(page: Vec<Notification>, unread: u64) -> Self {
        let api = Self::default();
        api.set(page, unread);
        api
    }

    pub fn set(&self, page: Vec<Notification>, unread: u64) {
        *self.page.lock().unwrap() = page;
        *self.unread.lock().unwrap() = unread;
    }

    /// The next `fetch_page` captures its page, then waits until the
    /// returned gate is notified.
    pub fn hold_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.held.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Every `fetch_page` sleeps this long after capturing its page.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn down() -> NotifyError {
        NotifyError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn fetch_page(&self, _page: u32, size: u32) -> Result<Vec<Notification>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        let page: Vec<Notification> = self
            .page
            .lock()
            .unwrap()
            .iter()
            .take(size as usize)
            .cloned()
            .collect();
        let gate = self.held.lock().unwrap().take();
        let delay = *self.fetch_delay.lock().unwrap();

        if let Some(gate) = gate {
            gate.notified().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(page)
    }

    async fn unread_count(&self) -> Result<u64> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(*self.unread.lock().unwrap())
    }

    async fn mark_read(&self, _id: &NotificationId) -> Result<()> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.mark_all_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(())
    }
}
