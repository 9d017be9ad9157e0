use std::collections::BTreeSet;

use chrono::{Duration, Utc};

use super::common::*;
use crate::admission::gateway::{AuditEvent, AuditPage, MEMBER_REMOVED_ACTION};
use crate::admission::{AuditHistoryResolver, GatewayError, MINISTRY_OF_JUSTICE};

fn lookback() -> Duration {
    Duration::days(90)
}

#[test]
fn follows_page_tokens_and_lowercases_users() {
    let gateway = FakeGateway::default()
        .with_audit_page(
            MINISTRY_OF_JUSTICE,
            None,
            AuditPage {
                events: vec![removal("Alice")],
                next_page_token: Some("page-2".to_string()),
            },
        )
        .with_audit_page(
            MINISTRY_OF_JUSTICE,
            Some("page-2"),
            AuditPage {
                events: vec![removal("bob")],
                next_page_token: None,
            },
        );
    let resolver = AuditHistoryResolver::new(&gateway, lookback());

    let removed = resolver
        .fetch_removal_set(MINISTRY_OF_JUSTICE)
        .expect("audit read");

    let expected: BTreeSet<String> = ["alice", "bob"].into_iter().map(String::from).collect();
    assert_eq!(removed, expected);
    assert_eq!(gateway.audit_calls(), 2);
}

#[test]
fn membership_check_ignores_case() {
    let gateway = FakeGateway::default().with_removed(MINISTRY_OF_JUSTICE, &["Alice"]);
    let resolver = AuditHistoryResolver::new(&gateway, lookback());
    assert!(resolver
        .was_removed_recently(MINISTRY_OF_JUSTICE, "ALICE")
        .expect("audit read"));
    assert!(!resolver
        .was_removed_recently(MINISTRY_OF_JUSTICE, "mallory")
        .expect("audit read"));
}

#[test]
fn events_outside_the_window_or_for_other_actions_are_ignored() {
    let since = Utc::now() - lookback();
    let page = AuditPage {
        events: vec![
            AuditEvent {
                user: Some("stale".to_string()),
                action: Some(MEMBER_REMOVED_ACTION.to_string()),
                created_at: Some(since - Duration::days(1)),
            },
            AuditEvent {
                user: Some("added".to_string()),
                action: Some("org.add_member".to_string()),
                created_at: Some(Utc::now()),
            },
            AuditEvent {
                user: None,
                action: Some(MEMBER_REMOVED_ACTION.to_string()),
                created_at: Some(Utc::now()),
            },
            removal("recent"),
        ],
        next_page_token: None,
    };
    let gateway = FakeGateway::default().with_audit_page(MINISTRY_OF_JUSTICE, None, page);
    let resolver = AuditHistoryResolver::new(&gateway, lookback());

    let removed = resolver
        .fetch_removal_set_since(MINISTRY_OF_JUSTICE, since)
        .expect("audit read");
    assert_eq!(removed.into_iter().collect::<Vec<_>>(), vec!["recent"]);
}

#[test]
fn repeated_page_token_is_an_error() {
    let looping = AuditPage {
        events: vec![removal("alice")],
        next_page_token: Some("again".to_string()),
    };
    let gateway = FakeGateway::default()
        .with_audit_page(MINISTRY_OF_JUSTICE, None, looping.clone())
        .with_audit_page(MINISTRY_OF_JUSTICE, Some("again"), looping);
    let resolver = AuditHistoryResolver::new(&gateway, lookback());

    assert!(matches!(
        resolver.fetch_removal_set(MINISTRY_OF_JUSTICE),
        Err(GatewayError::Unknown(_))
    ));
}

#[test]
fn empty_log_means_nobody_was_removed() {
    let gateway = FakeGateway::default();
    let resolver = AuditHistoryResolver::new(&gateway, lookback());
    assert!(resolver
        .fetch_removal_set(MINISTRY_OF_JUSTICE)
        .expect("audit read")
        .is_empty());
    assert_eq!(gateway.audit_calls(), 1);
}
