use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque notification key. The backend emits numeric ids; string ids are
/// accepted too so the same type works against either form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct NotificationId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for NotificationId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        }
    }
}

impl From<NotificationId> for String {
    fn from(id: NotificationId) -> Self {
        id.0
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for NotificationId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl NotificationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification category as tagged by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    NewOrder,
    Order,
    OrderApproved,
    OrderConfirmed,
    OrderStatus,
    SellerApproval,
    #[default]
    System,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::NewOrder => "NEW_ORDER",
            NotificationKind::Order => "ORDER",
            NotificationKind::OrderApproved => "ORDER_APPROVED",
            NotificationKind::OrderConfirmed => "ORDER_CONFIRMED",
            NotificationKind::OrderStatus => "ORDER_STATUS",
            NotificationKind::SellerApproval => "SELLER_APPROVAL",
            NotificationKind::System => "SYSTEM",
            NotificationKind::Other(s) => s,
        }
    }

    /// Order events get the package icon on every surface.
    pub fn is_order(&self) -> bool {
        matches!(
            self,
            NotificationKind::NewOrder
                | NotificationKind::Order
                | NotificationKind::OrderApproved
                | NotificationKind::OrderConfirmed
                | NotificationKind::OrderStatus
        )
    }
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NEW_ORDER" => NotificationKind::NewOrder,
            "ORDER" => NotificationKind::Order,
            "ORDER_APPROVED" => NotificationKind::OrderApproved,
            "ORDER_CONFIRMED" => NotificationKind::OrderConfirmed,
            "ORDER_STATUS" => NotificationKind::OrderStatus,
            "SELLER_APPROVAL" => NotificationKind::SellerApproval,
            "SYSTEM" => NotificationKind::System,
            _ => NotificationKind::Other(s),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// A single notification as delivered by either the poll or the push path.
///
/// Everything except `is_read` is fixed once the backend creates the record;
/// `is_read` only changes through the read-state protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "createdAt", deserialize_with = "deserialize_created_at")]
    pub created_at: NaiveDateTime,
    /// Deep-link target. The backend calls it `link`, some views `path`.
    #[serde(
        rename = "link",
        alias = "path",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub path: Option<String>,
    #[serde(rename = "isRead", alias = "read", default)]
    pub is_read: bool,
}

impl Notification {
    /// Decode a push payload body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// Local date-time (`2024-05-01T10:15:30.123`) or RFC 3339 with offset,
/// the latter normalized to UTC.
fn deserialize_created_at<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Ok(naive);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.naive_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid createdAt '{}': {}", raw, e)))
}
