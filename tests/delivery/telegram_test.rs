//! Tests for `TelegramClient` against a local stub of the Bot API.

use std::time::Duration;

use smsgw::delivery::{DeliveryClient, DeliveryError, TelegramClient, TelegramConfig};

use crate::support::StubBotApi;

fn client_for(stub: &StubBotApi) -> TelegramClient {
    let mut config = TelegramConfig::new("123:secret", "-100");
    config.api_base = stub.base_url();
    config.timeout = Duration::from_secs(5);
    TelegramClient::new(config)
}

#[tokio::test]
async fn posts_html_message_to_send_message() {
    let stub = StubBotApi::start(vec![(200, r#"{"ok":true,"result":{}}"#)]).await;
    let client = client_for(&stub);

    client
        .send("+1<555>", "Tom & Jerry")
        .await
        .expect("should deliver");

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(
        requests[0]
            .request_line
            .starts_with("POST /bot123:secret/sendMessage "),
        "unexpected request line: {}",
        requests[0].request_line
    );
    let body: serde_json::Value =
        serde_json::from_str(&requests[0].body).expect("JSON request body");
    assert_eq!(body["chat_id"], "-100");
    assert_eq!(body["parse_mode"], "HTML");
    assert_eq!(body["text"], "<b>+1&lt;555&gt;</b>\nTom &amp; Jerry");
}

#[tokio::test]
async fn non_success_status_carries_api_description() {
    let stub = StubBotApi::start(vec![(
        400,
        r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
    )])
    .await;
    let client = client_for(&stub);

    match client.send("+1", "hi").await {
        Err(DeliveryError::Status {
            status,
            description,
        }) => {
            assert_eq!(status, 400);
            assert_eq!(description, "Bad Request: chat not found");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn connection_failure_is_http_error_without_token() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr")
    };
    let mut config = TelegramConfig::new("123:secret", "-100");
    config.api_base = format!("http://{addr}");
    let client = TelegramClient::new(config);

    let err = client.send("+1", "hi").await.expect_err("nothing listening");

    assert!(matches!(err, DeliveryError::Http(_)));
    assert!(!err.to_string().contains("secret"));
}
