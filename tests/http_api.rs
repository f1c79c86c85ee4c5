//! REST client against a mock storefront API.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_notify::api::{HttpNotificationApi, NotificationApi, StaticToken};
use storefront_notify::models::{NotificationId, NotificationKind};
use storefront_notify::NotifyError;

fn client(server: &MockServer, token: Option<&str>) -> HttpNotificationApi {
    HttpNotificationApi::new(
        format!("{}/api", server.uri()),
        Arc::new(StaticToken::new(token.map(str::to_string))),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_page_sends_bearer_and_parses_content() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .and(query_param("page", "0"))
        .and(query_param("size", "20"))
        .and(header("authorization", "Bearer jwt-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "OK",
            "data": {
                "content": [
                    {
                        "id": 42,
                        "type": "NEW_ORDER",
                        "title": "New order",
                        "message": "Order #42 was placed",
                        "createdAt": "2024-05-10T09:30:00",
                        "link": "/admin/orders/42",
                        "isRead": false
                    },
                    {
                        "id": "41",
                        "type": "PROMO_BLAST",
                        "title": "Weekend sale",
                        "message": "",
                        "createdAt": "2024-05-09T18:00:00Z",
                        "read": true
                    }
                ],
                "totalElements": 2
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Some("jwt-123"));
    let page = api.fetch_page(0, 20).await.unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, NotificationId::from(42));
    assert_eq!(page[0].kind, NotificationKind::NewOrder);
    assert_eq!(page[0].path.as_deref(), Some("/admin/orders/42"));
    assert!(!page[0].is_read);
    assert_eq!(page[1].id, NotificationId::from("41"));
    assert_eq!(page[1].kind, NotificationKind::Other("PROMO_BLAST".into()));
    assert!(page[1].is_read);
}

#[tokio::test]
async fn test_unread_count() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": 7
        })))
        .mount(&server)
        .await;

    assert_eq!(client(&server, None).unread_count().await.unwrap(), 7);
}

#[tokio::test]
async fn test_mark_endpoints_use_put() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/notifications/42/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": null})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/notifications/read-all"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Some("jwt"));
    api.mark_read(&NotificationId::from(42)).await.unwrap();
    api.mark_all_read().await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_maps_to_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server, Some("expired")).unread_count().await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_server_error_and_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/notifications/read-all"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/notifications/5/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Notification not found"
        })))
        .mount(&server)
        .await;

    let api = client(&server, Some("jwt"));

    match api.mark_all_read().await.unwrap_err() {
        NotifyError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    match api.mark_read(&NotificationId::from(5)).await.unwrap_err() {
        NotifyError::Rejected(message) => assert_eq!(message, "Notification not found"),
        other => panic!("unexpected error: {other:?}"),
    }
}
