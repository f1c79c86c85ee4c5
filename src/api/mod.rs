//! Remote notification API: the source of truth behind the poll driver and
//! the read-state synchronizer.
//!
//! The store never talks HTTP itself; it only sees what an implementation of
//! [`NotificationApi`] hands back. [`http::HttpNotificationApi`] is the
//! storefront REST implementation; tests plug in their own.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::Result;
use crate::models::{Notification, NotificationId};

pub mod http;

pub use http::HttpNotificationApi;

/// The four remote calls this subsystem consumes.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// One page of the current user's notifications, newest first.
    async fn fetch_page(&self, page: u32, size: u32) -> Result<Vec<Notification>>;

    /// Total unread notifications for the current user.
    async fn unread_count(&self) -> Result<u64>;

    async fn mark_read(&self, id: &NotificationId) -> Result<()>;

    async fn mark_all_read(&self) -> Result<()>;
}

/// Supplies the bearer token of the signed-in user. Token storage belongs to
/// the authentication collaborator.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, typically read from config.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn bearer_token(&self) -> Option<String> {
        self()
    }
}

/// `{ success, message, data }` wrapper every storefront endpoint returns.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

fn default_success() -> bool {
    true
}

/// The part of a Spring `Page` we care about.
#[derive(Debug, Deserialize)]
pub(crate) struct PageBody {
    #[serde(default)]
    pub content: Vec<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_with_page() {
        let body = json!({
            "success": true,
            "message": "ok",
            "data": {
                "content": [
                    {"id": 2, "title": "b", "message": "", "read": false, "type": "ORDER", "createdAt": "2024-05-02T08:00:00"},
                    {"id": 1, "title": "a", "message": "", "read": true, "type": "SYSTEM", "createdAt": "2024-05-01T08:00:00"}
                ],
                "totalElements": 2,
                "number": 0
            }
        });
        let env: ApiEnvelope<PageBody> = serde_json::from_value(body).unwrap();
        assert!(env.success);
        let page = env.data.unwrap();
        assert_eq!(page.content.len(), 2);
        assert!(page.content[1].is_read);
    }

    #[test]
    fn test_envelope_missing_data() {
        let env: ApiEnvelope<i64> = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(env.data.is_none());
    }

    #[test]
    fn test_static_token_ignores_blank() {
        assert_eq!(StaticToken::new(Some("  ".into())).bearer_token(), None);
        assert_eq!(
            StaticToken::new(Some("jwt".into())).bearer_token().as_deref(),
            Some("jwt")
        );
    }

    #[test]
    fn test_closure_token_provider() {
        let provider = || Some("from-closure".to_string());
        assert_eq!(provider.bearer_token().as_deref(), Some("from-closure"));
    }
}
