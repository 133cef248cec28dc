//! One full poll cycle built from config against mock platform and generation servers.

use httpmock::prelude::*;
use relay_core::config::{Config, ReplyMode};
use relay_core::relay::{CycleOutcome, Relay};
use relay_core::shutdown;
use serde_json::json;
use std::path::PathBuf;

fn temp_config_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("relay-cycle-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir.join("config.json")
}

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.platform.api_base = format!("{}/api/v9", server.base_url());
    config.platform.token = Some("test-token".to_string());
    config.platform.channels = vec!["C1".to_string()];
    config.generation.api_base = format!("{}/gemini", server.base_url());
    config.generation.model = "gemini-test".to_string();
    config.generation.api_key = Some("test-key".to_string());
    config.reply.read_delay_secs = 0;
    config.reply.reply_delay_secs = 0;
    config.policy.probability = 1.0;
    config.http.base_delay_ms = 1;
    config.http.max_delay_ms = 5;
    config
}

#[tokio::test]
async fn new_message_is_answered_once_in_reply_mode() {
    let server = MockServer::start();
    let me = server.mock(|when, then| {
        when.method(GET).path("/api/v9/users/@me").header_exists("authorization");
        then.status(200).json_body(json!({"id": "BOT"}));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v9/channels/C1/messages")
            .query_param("limit", "1");
        then.status(200).json_body(json!([
            {"id": "100", "author": {"id": "U1"}, "type": 0, "content": "hello there friend"}
        ]));
    });
    let generate = server.mock(|when, then| {
        when.method(POST)
            .path("/gemini/models/gemini-test:generateContent")
            .query_param_exists("key");
        then.status(200).json_body(json!({
            "candidates": [{"content": {"parts": [{"text": "  hey, good to see you  "}]}}]
        }));
    });
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v9/channels/C1/messages")
            .json_body_includes(
                json!({
                    "content": "hey, good to see you",
                    "message_reference": {"message_id": "100"}
                })
                .to_string(),
            );
        then.status(201).json_body(json!({"id": "101"}));
    });

    let config = config_for(&server);
    assert_eq!(config.reply.mode, ReplyMode::Reply);
    let (_trigger, shutdown) = shutdown::channel();
    let mut relay = Relay::from_config(&config, &temp_config_path(), &shutdown)
        .await
        .expect("relay starts");
    me.assert_calls(1);
    assert_eq!(relay.identity().user_id, "BOT");

    assert_eq!(
        relay.poll_channel(0, &shutdown).await,
        Some(CycleOutcome::Replied {
            message_id: "100".to_string()
        })
    );
    assert_eq!(
        relay.poll_channel(0, &shutdown).await,
        Some(CycleOutcome::NothingNew)
    );

    generate.assert_calls(1);
    post.assert_calls(1);
    assert_eq!(relay.cursor("C1").and_then(|c| c.last_seen()), Some("100"));
}

#[tokio::test]
async fn static_lines_are_sent_when_generation_is_disabled() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v9/users/@me");
        then.status(200).json_body(json!({"id": "BOT"}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v9/channels/C1/messages");
        then.status(200).json_body(json!([
            {"id": "7", "author": {"id": "U1"}, "type": 0, "content": "is anyone here today?"}
        ]));
    });
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v9/channels/C1/messages")
            .json_body_includes(json!({"content": "static hello"}).to_string());
        then.status(201).json_body(json!({"id": "8"}));
    });

    let config_path = temp_config_path();
    let messages = config_path.with_file_name("messages.txt");
    std::fs::write(&messages, "static hello\n").expect("write messages");

    let mut config = config_for(&server);
    config.generation.enabled = false;
    config.generation.api_key = None;
    config.reply.mode = ReplyMode::Send;

    let (_trigger, shutdown) = shutdown::channel();
    let mut relay = Relay::from_config(&config, &config_path, &shutdown)
        .await
        .expect("relay starts");
    assert!(relay.run_cycle(&shutdown).await);

    post.assert_calls(1);
    assert_eq!(relay.cursor("C1").and_then(|c| c.last_seen()), Some("7"));
}

#[tokio::test]
async fn unauthorized_identity_lookup_fails_startup() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v9/users/@me");
        then.status(401).json_body(json!({"message": "401: Unauthorized"}));
    });

    let (_trigger, shutdown) = shutdown::channel();
    let result = Relay::from_config(&config_for(&server), &temp_config_path(), &shutdown).await;
    assert!(result.is_err());
}
