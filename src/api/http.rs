//! Storefront REST client for the notification endpoints.
//!
//! - `GET  /notifications?page=&size=`
//! - `GET  /notifications/unread-count`
//! - `PUT  /notifications/{id}/read`
//! - `PUT  /notifications/read-all`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};

use super::{ApiEnvelope, NotificationApi, PageBody, TokenProvider};
use crate::errors::{NotifyError, Result};
use crate::models::{Notification, NotificationId};

pub struct HttpNotificationApi {
    base_url: String,
    http: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpNotificationApi {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api`.
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("storefront-notify/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            tokens,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");

        if let Some(token) = self.tokens.bearer_token() {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send and unwrap the `{success, message, data}` envelope.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>> {
        let resp = req.send().await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("notification api rejected credentials");
            return Err(NotifyError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(NotifyError::Rejected(
                envelope.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_page(&self, page: u32, size: u32) -> Result<Vec<Notification>> {
        let req = self
            .request(Method::GET, "/notifications")
            .query(&[("page", page), ("size", size)]);

        let page: Option<PageBody> = self.send(req).await?;
        Ok(page.map(|p| p.content).unwrap_or_default())
    }

    async fn unread_count(&self) -> Result<u64> {
        let req = self.request(Method::GET, "/notifications/unread-count");
        let count: Option<i64> = self.send(req).await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        let path = format!("/notifications/{}/read", urlencoding::encode(id.as_str()));
        let _: Option<IgnoredAny> = self.send(self.request(Method::PUT, &path)).await?;
        tracing::debug!(id = %id, "marked notification read");
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        let req = self.request(Method::PUT, "/notifications/read-all");
        let _: Option<IgnoredAny> = self.send(req).await?;
        tracing::debug!("marked all notifications read");
        Ok(())
    }
}
