use httpmock::prelude::*;
use join_github::admission::{NotifyError, ReviewNotifier, ReviewRequest, SlackNotifier};
use serde_json::json;

const CHANNEL: &str = "C033QBE511V";

fn notifier(server: &MockServer) -> SlackNotifier {
    SlackNotifier::new(server.base_url(), "xoxb-test", CHANNEL).expect("notifier builds")
}

fn review(organisation: &str) -> ReviewRequest {
    ReviewRequest {
        candidate_identity: "contractor@example.com".to_string(),
        email_address: "contractor@example.com".to_string(),
        organisation: organisation.to_string(),
    }
}

#[test]
fn deferred_reviews_are_posted_as_one_message() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .header("authorization", "Bearer xoxb-test")
            .json_body_partial(
                json!({
                    "channel": CHANNEL,
                    "text": "*Join GitHub Automation*\nPlease review add user contractor@example.com to GitHub Organisation/s: ministryofjustice and moj-analytical-services. Email address is contractor@example.com."
                })
                .to_string(),
            );
        then.status(200).json_body(json!({ "ok": true }));
    });

    notifier(&server)
        .notify_deferred(&[review("ministryofjustice"), review("moj-analytical-services")])
        .expect("message posted");

    post.assert_hits(1);
}

#[test]
fn no_deferred_reviews_posts_nothing() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200).json_body(json!({ "ok": true }));
    });

    notifier(&server)
        .notify_deferred(&[])
        .expect("nothing to send");

    post.assert_hits(0);
}

#[test]
fn rejoin_request_names_user_and_organisations() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .json_body_partial(
                json!({
                    "text": "*Join GitHub Automation*\nThe user mallory wants to rejoin the GitHub Organisation/s: ministryofjustice. Email address is mallory@example.com."
                })
                .to_string(),
            );
        then.status(200).json_body(json!({ "ok": true }));
    });

    notifier(&server)
        .notify_rejoin_request(
            "mallory",
            "mallory@example.com",
            &["ministryofjustice".to_string()],
        )
        .expect("message posted");

    post.assert();
}

#[test]
fn slack_level_errors_are_rejections() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({ "ok": false, "error": "channel_not_found" }));
    });

    let result = notifier(&server).notify_deferred(&[review("ministryofjustice")]);

    assert_eq!(
        result,
        Err(NotifyError::Rejected("channel_not_found".to_string()))
    );
}

#[test]
fn http_failures_are_transport_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(500);
    });

    let result = notifier(&server).notify_deferred(&[review("ministryofjustice")]);

    assert!(matches!(result, Err(NotifyError::Transport(_))));
}
