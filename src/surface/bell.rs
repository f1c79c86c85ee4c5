use tokio::sync::watch;

use crate::store::NotificationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeStyle {
    /// Storefront header: anything above the cap shows as `{cap}+`.
    Capped(u64),
    /// Admin/seller layouts show the raw count.
    Exact,
}

impl BadgeStyle {
    pub const HEADER: BadgeStyle = BadgeStyle::Capped(9);
}

/// Bell icon with the unread badge.
pub struct BellBadge {
    state: watch::Receiver<NotificationState>,
    style: BadgeStyle,
}

impl BellBadge {
    pub fn new(state: watch::Receiver<NotificationState>, style: BadgeStyle) -> Self {
        Self { state, style }
    }

    pub fn unread(&self) -> u64 {
        self.state.borrow().unread_count
    }

    /// Badge text, `None` when there is nothing unread.
    pub fn label(&self) -> Option<String> {
        let unread = self.unread();
        if unread == 0 {
            return None;
        }
        Some(match self.style {
            BadgeStyle::Capped(cap) if unread > cap => format!("{}+", cap),
            _ => unread.to_string(),
        })
    }

    /// The admin bell animates while anything is unread.
    pub fn is_alerting(&self) -> bool {
        self.unread() > 0
    }

    /// Wait for the next store change. `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}
