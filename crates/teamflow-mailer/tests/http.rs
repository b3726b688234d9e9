//! HTTP boundary tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use teamflow_mailer::{EmailGateway, router};
use teamflow_smtp::testing::{MockConnector, MockRelay};
use tower::ServiceExt;

fn env() -> HashMap<String, String> {
    [
        ("SMTP_HOST", "localhost"),
        ("SMTP_PORT", "2525"),
        ("SMTP_USERNAME", "u"),
        ("SMTP_PASSWORD", "p"),
        ("FROM_EMAIL", "sender@x.com"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/send-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(connector: &MockConnector, body: &str) -> (StatusCode, Value) {
    let app = router(Arc::new(EmailGateway::new(connector.clone(), env())));
    let response = app.oneshot(post(body)).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn accepted_send_returns_200() {
    let connector = MockConnector::new(MockRelay::new());
    let body = json!({
        "to": "client@y.com",
        "subject": "Invoice 1",
        "html": "<b>Hi</b>",
        "text": "Hi"
    });

    let (status, json) = call(&connector, &body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["message"].as_str().unwrap().contains("MOCK123"));
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn failed_send_returns_500_with_details() {
    let connector = MockConnector::new(
        MockRelay::new().reply("RCPT", "550 5.1.1 No such user"),
    );
    let body = json!({"to": "ghost@y.com", "subject": "Hello", "html": "<p>Hi</p>"});

    let (status, json) = call(&connector, &body.to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["details"]["stage"], "recipient");
    assert_eq!(json["details"]["code"], 550);
    assert_eq!(json["details"]["reply"], "5.1.1 No such user");
}

#[tokio::test]
async fn malformed_body_is_rejected_before_the_gateway() {
    let connector = MockConnector::new(MockRelay::new());

    let (status, _) = call(&connector, r#"{"to": "client@y.com"}"#).await;
    assert!(status.is_client_error());
    assert!(connector.transcript().await.connects.is_empty());
}
