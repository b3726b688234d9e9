//! Property-based tests for the composer.
//!
//! Arbitrary bodies and subjects must always yield one delimiter per part
//! and exactly one closing delimiter.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use teamflow_mime::{EmailContent, Mailbox, compose};

fn body_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ -~]{0,200}",
        "\\PC{0,80}",
        Just("<html><body>--</body></html>".to_string()),
    ]
}

fn content_strategy() -> impl Strategy<Value = EmailContent> {
    (
        "\\PC{0,60}",
        body_strategy(),
        proptest::option::of(body_strategy()),
    )
        .prop_map(|(subject, html, text)| EmailContent {
            from: Mailbox::with_name("TeamFlow", "sender@x.com"),
            to: "client@y.com".to_string(),
            subject,
            html,
            text,
        })
}

proptest! {
    #[test]
    fn every_part_is_delimited_and_closed_once(content in content_strategy()) {
        let message = compose(&content).unwrap();
        let boundary = message.boundary();
        let parts = 1 + usize::from(content.text.is_some());

        let opening = format!("--{boundary}\r\n");
        let closing = format!("--{boundary}--");
        prop_assert_eq!(message.as_str().matches(&opening).count(), parts);
        prop_assert_eq!(message.as_str().matches(&closing).count(), 1);
        let closing_line = format!("{closing}\r\n");
        prop_assert!(message.as_str().ends_with(&closing_line));
    }

    #[test]
    fn html_only_has_no_plain_part(html in body_strategy()) {
        let content = EmailContent {
            from: Mailbox::new("sender@x.com"),
            to: "client@y.com".to_string(),
            subject: "Invoice 1".to_string(),
            html,
            text: None,
        };
        let message = compose(&content).unwrap();
        let head_count = |ct: &str| message.as_str().matches(&format!("Content-Type: {ct}")).count();

        prop_assert_eq!(head_count("text/html"), 1);
        prop_assert_eq!(head_count("text/plain"), 0);
    }

    #[test]
    fn headers_stay_on_their_lines(subject in "\\PC{0,60}") {
        let content = EmailContent {
            from: Mailbox::with_name("TeamFlow", "sender@x.com"),
            to: "client@y.com".to_string(),
            subject,
            html: "<b>Hi</b>".to_string(),
            text: None,
        };
        let message = compose(&content).unwrap();
        let (head, _) = message.as_str().split_once("\r\n\r\n").unwrap();
        // Folded continuation lines start with whitespace and carry no name.
        let names: Vec<&str> = head
            .split("\r\n")
            .filter(|line| !line.starts_with([' ', '\t']))
            .map(|line| line.split_once(": ").unwrap().0)
            .collect();
        let longest_line = head.split("\r\n").map(str::len).max().unwrap_or(0);
        prop_assert!(longest_line <= 998);

        prop_assert_eq!(names, ["From", "To", "Subject", "MIME-Version", "Content-Type"]);
    }
}
