//! End-to-end gateway tests against the scripted relay.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use teamflow_mailer::{EmailGateway, SendEmailRequest};
use teamflow_smtp::testing::{MockConnector, MockRelay};

fn config(extra: &[(&str, &str)]) -> HashMap<String, String> {
    [
        ("SMTP_HOST", "localhost"),
        ("SMTP_PORT", "2525"),
        ("SMTP_USERNAME", "u"),
        ("SMTP_PASSWORD", "p"),
        ("FROM_EMAIL", "sender@x.com"),
    ]
    .iter()
    .chain(extra)
    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
    .collect()
}

fn invoice() -> SendEmailRequest {
    SendEmailRequest {
        to: "client@y.com".to_string(),
        subject: "Invoice 1".to_string(),
        html: "<b>Hi</b>".to_string(),
        text: Some("Hi".to_string()),
    }
}

#[tokio::test]
async fn invoice_is_delivered_in_protocol_order() {
    let connector = MockConnector::new(MockRelay::new());
    let gateway = EmailGateway::new(connector.clone(), config(&[]));

    let response = gateway.handle(&invoice()).await;
    assert!(response.success, "{response:?}");
    assert!(response.message.unwrap().contains("MOCK123"));

    let transcript = connector.transcript().await;
    assert_eq!(transcript.connects, vec!["localhost:2525"]);
    assert_eq!(
        transcript.commands,
        vec![
            "EHLO localhost",
            "AUTH PLAIN AHUAcA==",
            "MAIL FROM:<sender@x.com>",
            "RCPT TO:<client@y.com>",
            "DATA",
            "QUIT",
        ]
    );

    let message = String::from_utf8(transcript.message.unwrap()).unwrap();
    assert!(message.starts_with("From: TeamFlow <sender@x.com>\r\nTo: client@y.com\r\nSubject: Invoice 1\r\n"));
    assert!(message.contains("Content-Type: text/plain; charset=UTF-8\r\n\r\nHi\r\n"));
    assert!(message.contains("Content-Type: text/html; charset=UTF-8\r\n\r\n<b>Hi</b>\r\n"));
    assert!(message.ends_with("\r\n.\r\n"));
}

#[tokio::test]
async fn transient_recipient_rejection_is_reported_once() {
    let connector = MockConnector::new(
        MockRelay::new().reply("RCPT", "451 4.3.0 Mailbox temporarily unavailable"),
    );
    let gateway = EmailGateway::new(connector.clone(), config(&[]));

    let response = gateway.handle(&invoice()).await;
    assert!(!response.success);
    let details = response.details.unwrap();
    assert_eq!(details.stage, "recipient");
    assert_eq!(details.code, Some(451));
    assert_eq!(
        details.reply.as_deref(),
        Some("4.3.0 Mailbox temporarily unavailable")
    );

    let transcript = connector.transcript().await;
    assert_eq!(transcript.connects.len(), 1);
    assert_eq!(
        transcript.verbs().iter().filter(|v| *v == "RCPT").count(),
        1
    );
    assert!(transcript.message.is_none());
}

#[tokio::test]
async fn bad_credentials_surface_auth_stage() {
    let connector = MockConnector::new(
        MockRelay::new().reply("AUTH", "535 5.7.8 Username and Password not accepted"),
    );
    let gateway = EmailGateway::new(connector.clone(), config(&[]));

    let response = gateway.handle(&invoice()).await;
    let details = response.details.unwrap();
    assert_eq!(details.stage, "auth");
    assert_eq!(details.code, Some(535));
    assert!(!connector.transcript().await.verbs().contains(&"MAIL".to_string()));
}

#[tokio::test]
async fn missing_configuration_never_connects() {
    let connector = MockConnector::new(MockRelay::new());
    let mut env = config(&[]);
    env.remove("SMTP_PASSWORD");
    env.insert("FROM_EMAIL".to_string(), "  ".to_string());
    let gateway = EmailGateway::new(connector.clone(), env);

    let response = gateway.handle(&invoice()).await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert!(error.contains("SMTP_PASSWORD"));
    assert!(error.contains("FROM_EMAIL"));
    assert_eq!(response.details.unwrap().stage, "config");
    assert!(connector.transcript().await.connects.is_empty());
}

#[tokio::test]
async fn injected_recipient_is_refused_before_connecting() {
    let connector = MockConnector::new(MockRelay::new());
    let gateway = EmailGateway::new(connector.clone(), config(&[]));
    let request = SendEmailRequest {
        to: "client@y.com>\r\nRCPT TO:<victim@z.com".to_string(),
        ..invoice()
    };

    let response = gateway.handle(&request).await;
    assert_eq!(response.details.unwrap().stage, "request");
    assert!(connector.transcript().await.connects.is_empty());
}

#[tokio::test]
async fn custom_ehlo_name_is_announced() {
    let connector = MockConnector::new(MockRelay::new());
    let gateway = EmailGateway::new(
        connector.clone(),
        config(&[("SMTP_EHLO_NAME", "mailer.teamflow.dev")]),
    );

    assert!(gateway.handle(&invoice()).await.success);
    assert_eq!(
        connector.transcript().await.commands.first().map(String::as_str),
        Some("EHLO mailer.teamflow.dev")
    );
}

#[tokio::test(start_paused = true)]
async fn send_deadline_bounds_a_stalled_relay() {
    let connector = MockConnector::new(MockRelay::new().hang_on("DATA"));
    let gateway = EmailGateway::new(connector, config(&[("SMTP_SEND_TIMEOUT_SECS", "5")]));

    let response = gateway.handle(&invoice()).await;
    assert!(!response.success);
    assert_eq!(response.details.unwrap().stage, "data");
    assert!(response.error.unwrap().contains("timed out"));
}
