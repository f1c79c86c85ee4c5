use chrono::NaiveDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::EntryView;
use crate::errors::Result;
use crate::jobs::Refresher;
use crate::models::{Notification, NotificationId};
use crate::store::NotificationState;
use crate::sync::{Navigator, ReadStateSync};

/// Full notifications page (account and admin variants).
pub struct NotificationPage {
    state: watch::Receiver<NotificationState>,
    sync: ReadStateSync,
    refresher: Refresher,
}

impl NotificationPage {
    pub fn new(sync: ReadStateSync, refresher: Refresher) -> Self {
        Self {
            state: sync.subscribe(),
            sync,
            refresher,
        }
    }

    /// Pull fresh data when the page is opened.
    pub async fn open(&self) -> bool {
        self.refresher.refresh().await
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.state.borrow().notifications.clone()
    }

    pub fn rows(&self, now: NaiveDateTime) -> Vec<EntryView> {
        self.state
            .borrow()
            .notifications
            .iter()
            .map(|n| EntryView::new(n, now))
            .collect()
    }

    pub fn unread(&self) -> u64 {
        self.state.borrow().unread_count
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        self.sync.mark_as_read(id).await
    }

    pub async fn mark_all(&self) -> Result<()> {
        self.sync.mark_all_as_read().await
    }

    pub fn click(&self, notification: &Notification, navigator: &dyn Navigator) -> JoinHandle<Result<()>> {
        self.sync.open_entry(notification, navigator)
    }

    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::api::NotificationApi;
    use crate::errors::NotifyError;
    use crate::models::NotificationKind;
    use crate::store::NotificationStore;

    struct PageApi {
        fail_writes: AtomicBool,
    }

    fn notif(id: i64, is_read: bool) -> Notification {
        Notification {
            id: NotificationId::from(id),
            kind: NotificationKind::System,
            title: format!("n{}", id),
            message: "hello".into(),
            created_at: NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            path: None,
            is_read,
        }
    }

    #[async_trait]
    impl NotificationApi for PageApi {
        async fn fetch_page(&self, _page: u32, _size: u32) -> Result<Vec<Notification>> {
            Ok(vec![notif(2, false), notif(1, true)])
        }
        async fn unread_count(&self) -> Result<u64> {
            Ok(1)
        }
        async fn mark_read(&self, _id: &NotificationId) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(NotifyError::Status { status: 500, body: "boom".into() });
            }
            Ok(())
        }
        async fn mark_all_read(&self) -> Result<()> {
            Ok(())
        }
    }

    fn page(fail_writes: bool) -> (NotificationPage, NotificationStore) {
        let store = NotificationStore::new();
        let api = Arc::new(PageApi { fail_writes: AtomicBool::new(fail_writes) });
        let sync = ReadStateSync::new(store.clone(), api.clone());
        let refresher = Refresher::new(api, store.clone(), 20);
        (NotificationPage::new(sync, refresher), store)
    }

    #[tokio::test]
    async fn test_open_loads_entries() {
        let (page, _) = page(false);
        assert!(page.is_empty());
        assert!(page.open().await);
        assert_eq!(page.entries().len(), 2);
        assert_eq!(page.unread(), 1);

        let now = NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let rows = page.rows(now);
        assert!(rows[0].unread);
        assert_eq!(rows[0].when, "3 h ago");
    }

    #[tokio::test]
    async fn test_failed_mark_read_keeps_optimistic_state() {
        let (page, store) = page(true);
        page.open().await;

        let err = page.mark_read(&NotificationId::from(2)).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status { status: 500, .. }));
        assert_eq!(store.unread_count(), 0);
        assert!(store.snapshot().get(&NotificationId::from(2)).unwrap().is_read);
    }
}
