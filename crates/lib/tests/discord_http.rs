//! Discord client against a mock server: identity, latest message, dispatch, retries.

use httpmock::prelude::*;
use relay_core::channels::{
    build_payload, DiscordClient, DispatchError, MessagePlatform, PlatformError,
};
use relay_core::config::{BackoffKind, ReplyMode};
use relay_core::http::{HttpError, RetryClient, RetryPolicy};
use relay_core::shutdown;
use serde_json::json;
use std::time::Duration;

fn fast_policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: BackoffKind::Exponential,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn client(server: &MockServer, max_attempts: usize) -> DiscordClient {
    let http = RetryClient::with_client(reqwest::Client::new(), fast_policy(max_attempts));
    DiscordClient::new(
        Some(format!("{}/api/v9/", server.base_url())),
        "test-token".to_string(),
        http,
    )
}

#[tokio::test]
async fn current_user_sends_raw_token_and_reads_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v9/users/@me")
            .header("authorization", "test-token")
            .header_exists("x-relay-request-id")
            .header("x-relay-retry-attempt", "0");
        then.status(200)
            .json_body(json!({"id": "BOT", "username": "relay"}));
    });

    let identity = client(&server, 3)
        .current_user()
        .await
        .expect("identity resolves");

    mock.assert();
    assert_eq!(identity.user_id, "BOT");
}

#[tokio::test]
async fn latest_message_takes_the_first_entry() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v9/channels/C1/messages")
            .query_param("limit", "1");
        then.status(200).json_body(json!([
            {"id": "101", "author": {"id": "U1"}, "type": 0, "content": "newest message here"},
            {"id": "100", "author": {"id": "U2"}, "type": 0, "content": "older"}
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v9/channels/C2/messages");
        then.status(200).json_body(json!([]));
    });

    let discord = client(&server, 3);
    let latest = discord
        .latest_message("C1")
        .await
        .expect("read succeeds")
        .expect("one message");
    assert_eq!(latest.id, "101");
    assert_eq!(latest.author_id, "U1");
    assert_eq!(latest.text, "newest message here");

    let none = discord.latest_message("C2").await.expect("read succeeds");
    assert!(none.is_none());
}

#[tokio::test]
async fn latest_message_with_unexpected_shape_is_malformed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v9/channels/C1/messages");
        then.status(200).json_body(json!({"message": "not a list"}));
    });

    let err = client(&server, 3)
        .latest_message("C1")
        .await
        .expect_err("object is not a message list");
    assert!(matches!(err, PlatformError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn reply_payload_carries_message_reference() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v9/channels/C1/messages")
            .header("authorization", "test-token")
            .json_body_includes(
                json!({
                    "content": "hi back",
                    "message_reference": {"message_id": "100"}
                })
                .to_string(),
            );
        then.status(201).json_body(json!({"id": "102"}));
    });

    let payload = build_payload("hi back", Some("100"), ReplyMode::Reply);
    client(&server, 3)
        .create_message("C1", &payload)
        .await
        .expect("dispatch succeeds");
    mock.assert_calls(1);
}

#[tokio::test]
async fn rate_limited_dispatch_succeeds_on_fourth_attempt() {
    let server = MockServer::start();
    let limited: Vec<_> = ["0", "1", "2"]
        .iter()
        .map(|attempt| {
            server.mock(|when, then| {
                when.method(POST)
                    .path("/api/v9/channels/C1/messages")
                    .header("x-relay-retry-attempt", *attempt);
                then.status(429)
                    .json_body(json!({"message": "You are being rate limited.", "retry_after": 0.0}));
            })
        })
        .collect();
    let created = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v9/channels/C1/messages")
            .header("x-relay-retry-attempt", "3");
        then.status(201).json_body(json!({"id": "102"}));
    });

    let payload = build_payload("hello", None, ReplyMode::Send);
    client(&server, 5)
        .create_message("C1", &payload)
        .await
        .expect("fourth attempt succeeds");

    for mock in &limited {
        mock.assert_calls(1);
    }
    created.assert_calls(1);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/v9/channels/C1/messages");
        then.status(400).json_body(json!({"message": "Cannot send an empty message"}));
    });

    let payload = build_payload("", None, ReplyMode::Send);
    let err = client(&server, 5)
        .create_message("C1", &payload)
        .await
        .expect_err("400 fails");

    mock.assert_calls(1);
    match err {
        DispatchError::Http(HttpError::Protocol { status, .. }) => assert_eq!(status, 400),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn persistent_server_error_exhausts_retries() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v9/users/@me");
        then.status(503).body("unavailable");
    });

    let err = client(&server, 4)
        .current_user()
        .await
        .expect_err("503 never recovers");

    mock.assert_calls(4);
    match err {
        PlatformError::Http(HttpError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 4);
            assert_eq!(last.status(), Some(503));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

#[tokio::test]
async fn success_status_other_than_created_is_a_dispatch_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v9/channels/C1/messages");
        then.status(200).json_body(json!({"id": "102"}));
    });

    let payload = build_payload("hello", None, ReplyMode::Send);
    let err = client(&server, 3)
        .create_message("C1", &payload)
        .await
        .expect_err("only 201 counts");
    assert!(
        matches!(err, DispatchError::UnexpectedStatus { status: 200, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn shutdown_abandons_rate_limit_wait() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/v9/channels/C1/messages");
        then.status(429)
            .header("retry-after", "3600")
            .json_body(json!({"message": "You are being rate limited."}));
    });

    let (trigger, shutdown) = shutdown::channel();
    let http = RetryClient::with_client(
        reqwest::Client::new(),
        RetryPolicy {
            max_attempts: 5,
            backoff: BackoffKind::Constant,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_secs(3600),
        },
    )
    .with_shutdown(shutdown);
    let discord = DiscordClient::new(
        Some(format!("{}/api/v9", server.base_url())),
        "test-token".to_string(),
        http,
    );
    trigger.trigger();

    let payload = build_payload("hello", None, ReplyMode::Send);
    let err = tokio::time::timeout(Duration::from_secs(5), discord.create_message("C1", &payload))
        .await
        .expect("shutdown ends the wait")
        .expect_err("rate limited");

    mock.assert_calls(1);
    assert!(
        matches!(err, DispatchError::Http(HttpError::Cancelled { attempts: 1, .. })),
        "{err:?}"
    );
}
