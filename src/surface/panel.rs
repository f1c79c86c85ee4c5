use chrono::NaiveDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::EntryView;
use crate::errors::Result;
use crate::models::Notification;
use crate::store::NotificationState;
use crate::sync::{Navigator, ReadStateSync};

/// Entries shown in the dropdown before "see all".
pub const PANEL_LIMIT: usize = 8;

/// Dropdown panel under the admin/seller bell.
pub struct NotificationPanel {
    state: watch::Receiver<NotificationState>,
    sync: ReadStateSync,
    open: bool,
}

impl NotificationPanel {
    pub fn new(sync: ReadStateSync) -> Self {
        Self {
            state: sync.subscribe(),
            sync,
            open: false,
        }
    }

    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.state
            .borrow()
            .notifications
            .iter()
            .take(PANEL_LIMIT)
            .cloned()
            .collect()
    }

    pub fn rows(&self, now: NaiveDateTime) -> Vec<EntryView> {
        self.state
            .borrow()
            .notifications
            .iter()
            .take(PANEL_LIMIT)
            .map(|n| EntryView::new(n, now))
            .collect()
    }

    pub fn unread(&self) -> u64 {
        self.state.borrow().unread_count
    }

    /// The footer "mark all as read" button only shows with something unread.
    pub fn shows_mark_all(&self) -> bool {
        self.unread() > 0
    }

    /// Entry click: mark all read, follow the link, close the panel.
    pub fn click(&mut self, notification: &Notification, navigator: &dyn Navigator) -> JoinHandle<Result<()>> {
        let write = self.sync.open_entry(notification, navigator);
        self.open = false;
        write
    }

    pub async fn mark_all(&self) -> Result<()> {
        self.sync.mark_all_as_read().await
    }

    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::api::NotificationApi;
    use crate::models::{NotificationId, NotificationKind};
    use crate::store::NotificationStore;

    #[derive(Default)]
    struct CountingApi {
        mark_all_calls: AtomicUsize,
    }

    #[async_trait]
    impl NotificationApi for CountingApi {
        async fn fetch_page(&self, _page: u32, _size: u32) -> Result<Vec<Notification>> {
            Ok(Vec::new())
        }
        async fn unread_count(&self) -> Result<u64> {
            Ok(0)
        }
        async fn mark_read(&self, _id: &NotificationId) -> Result<()> {
            Ok(())
        }
        async fn mark_all_read(&self) -> Result<()> {
            self.mark_all_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn notif(id: i64, path: Option<&str>) -> Notification {
        Notification {
            id: NotificationId::from(id),
            kind: NotificationKind::NewOrder,
            title: format!("order {}", id),
            message: String::new(),
            created_at: NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            path: path.map(str::to_string),
            is_read: false,
        }
    }

    fn panel_with(count: i64) -> (NotificationPanel, Arc<CountingApi>, NotificationStore) {
        let store = NotificationStore::new();
        let api = Arc::new(CountingApi::default());
        let list = (1..=count).rev().map(|i| notif(i, Some("/admin/orders"))).collect();
        store.apply_poll_refresh(list, count as u64);
        let panel = NotificationPanel::new(ReadStateSync::new(store.clone(), api.clone()));
        (panel, api, store)
    }

    #[test]
    fn test_panel_shows_first_eight() {
        let (panel, _, _) = panel_with(12);
        let entries = panel.entries();
        assert_eq!(entries.len(), PANEL_LIMIT);
        assert_eq!(entries[0].id, NotificationId::from(12));
        assert_eq!(panel.unread(), 12);
        assert!(panel.shows_mark_all());
    }

    #[test]
    fn test_toggle_and_close() {
        let (mut panel, _, _) = panel_with(1);
        assert!(!panel.is_open());
        assert!(panel.toggle());
        assert!(!panel.toggle());
        panel.toggle();
        panel.close();
        assert!(!panel.is_open());
    }

    #[tokio::test]
    async fn test_click_marks_all_navigates_and_closes() {
        let (mut panel, api, store) = panel_with(3);
        let visited = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = visited.clone();
        let navigator = move |path: &str| sink.lock().unwrap().push(path.to_string());

        panel.toggle();
        let entry = panel.entries()[1].clone();
        let write = panel.click(&entry, &navigator);

        assert!(!panel.is_open());
        assert_eq!(store.unread_count(), 0);
        assert_eq!(visited.lock().unwrap().as_slice(), ["/admin/orders"]);
        write.await.unwrap().unwrap();
        assert_eq!(api.mark_all_calls.load(Ordering::SeqCst), 1);
        assert!(!panel.shows_mark_all());
    }
}
