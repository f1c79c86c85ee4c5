//! storefront-notify: notification sync for the storefront.
//!
//! A live STOMP channel and a fallback poll both feed one
//! [`store::NotificationStore`]; surfaces render projections of it and route
//! read gestures through [`sync::ReadStateSync`]. [`session::NotificationHub`]
//! ties the pieces to the signed-in user.

pub mod api;
pub mod channel;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod session;
pub mod store;
pub mod surface;
pub mod sync;

pub use errors::{NotifyError, Result};
pub use models::{Notification, NotificationId, NotificationKind};
pub use session::NotificationHub;
pub use store::{NotificationState, NotificationStore};
