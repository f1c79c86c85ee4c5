//! Surface bindings: read-only projections of the store for the header bell,
//! the admin/seller dropdown panel and the notifications page.
//!
//! Bindings hold a `watch` receiver and a [`ReadStateSync`]; they can read
//! state and forward gestures but have no way to touch the store directly.
//!
//! [`ReadStateSync`]: crate::sync::ReadStateSync

use chrono::NaiveDateTime;

use crate::models::{Notification, NotificationId};

pub mod bell;
pub mod page;
pub mod panel;

pub use bell::{BadgeStyle, BellBadge};
pub use page::NotificationPage;
pub use panel::{NotificationPanel, PANEL_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryIcon {
    Package,
    Bell,
}

/// One row as any surface renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub when: String,
    pub unread: bool,
    pub icon: EntryIcon,
    pub path: Option<String>,
}

impl EntryView {
    pub fn new(n: &Notification, now: NaiveDateTime) -> Self {
        Self {
            id: n.id.clone(),
            title: n.title.clone(),
            message: n.message.clone(),
            when: relative_time(n.created_at, now),
            unread: !n.is_read,
            icon: if n.kind.is_order() {
                EntryIcon::Package
            } else {
                EntryIcon::Bell
            },
            path: n.path.clone(),
        }
    }
}

/// "just now", "5 min ago", "3 h ago", "2 d ago", then a short date.
pub fn relative_time(created_at: NaiveDateTime, now: NaiveDateTime) -> String {
    let elapsed = now.signed_duration_since(created_at);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        format!("{} h ago", hours)
    } else if days < 7 {
        format!("{} d ago", days)
    } else {
        created_at.format("%b %-d, %Y").to_string()
    }
}
