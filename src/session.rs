//! Session hub: follows the signed-in user.
//!
//! "User became active" connects the live channel and starts the poll;
//! "user became inactive" (logout) or a different user becoming active tears
//! both down before anything else happens, so no event or refresh from one
//! user can ever reach another user's store.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::NotificationApi;
use crate::channel::LiveChannel;
use crate::jobs::{self, PollConfig, PollHandle, Refresher};
use crate::store::NotificationStore;
use crate::surface::{BadgeStyle, BellBadge, NotificationPage, NotificationPanel};
use crate::sync::ReadStateSync;

struct ActiveSession {
    user_key: String,
    poll: PollHandle,
}

pub struct NotificationHub {
    store: NotificationStore,
    api: Arc<dyn NotificationApi>,
    channel: LiveChannel,
    poll: PollConfig,
    active: Mutex<Option<ActiveSession>>,
}

impl NotificationHub {
    pub fn new(api: Arc<dyn NotificationApi>, channel: LiveChannel, poll: PollConfig) -> Self {
        Self {
            store: NotificationStore::new(),
            api,
            channel,
            poll,
            active: Mutex::new(None),
        }
    }

    /// `user_key` became the signed-in user. Re-activating the same user is
    /// a no-op; a different user replaces the current session.
    pub async fn activate(&self, user_key: &str) {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if current.user_key == user_key {
                debug!(user = %user_key, "session already active");
                return;
            }
        }
        if let Some(previous) = active.take() {
            self.teardown(previous).await;
        }

        let store = self.store.clone();
        self.channel
            .connect(user_key, move |notification| {
                store.apply_push_event(notification);
            })
            .await;
        let poll = jobs::poll::spawn(self.api.clone(), self.store.clone(), self.poll);

        info!(user = %user_key, "notification session active");
        *active = Some(ActiveSession {
            user_key: user_key.to_string(),
            poll,
        });
    }

    /// The user signed out. Safe to call when nothing is active.
    pub async fn deactivate(&self) {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(session) => self.teardown(session).await,
            None => debug!("deactivate with no active session"),
        }
    }

    async fn teardown(&self, session: ActiveSession) {
        self.channel.disconnect().await;
        session.poll.stop().await;
        // Nothing of the departing user stays visible, including on-demand
        // refreshes that are still in flight.
        self.store.reset();
        info!(user = %session.user_key, "notification session ended");
    }

    pub async fn active_user(&self) -> Option<String> {
        self.active.lock().await.as_ref().map(|s| s.user_key.clone())
    }

    /// Refresh now instead of waiting for the next tick.
    pub async fn refresh(&self) -> bool {
        self.refresher().refresh().await
    }

    pub fn refresher(&self) -> Refresher {
        Refresher::new(self.api.clone(), self.store.clone(), self.poll.page_size)
    }

    pub fn read_state(&self) -> ReadStateSync {
        ReadStateSync::new(self.store.clone(), self.api.clone())
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn channel(&self) -> &LiveChannel {
        &self.channel
    }

    pub fn bell(&self, style: BadgeStyle) -> BellBadge {
        BellBadge::new(self.store.subscribe(), style)
    }

    pub fn panel(&self) -> NotificationPanel {
        NotificationPanel::new(self.read_state())
    }

    pub fn page(&self) -> NotificationPage {
        NotificationPage::new(self.read_state(), self.refresher())
    }
}
