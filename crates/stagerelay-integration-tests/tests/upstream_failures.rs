//! Integration test: relay behavior against failing or misbehaving upstreams

use futures::StreamExt;
use stagerelay_core::PhaseLabel;
use stagerelay_integration_tests::{run_session, spawn_relay};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn post_analysis(url: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .json(&serde_json::json!({ "text": "hello" }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_upstream_500_returns_connection_error_document() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let relay = spawn_relay(&mock_server.uri()).await;
    let response = post_analysis(&relay.url("/analysis")).await;

    assert_eq!(response.status(), 502);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["code"], "CONNECTION_ERROR");
    assert!(json["error"].is_string());
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_unreachable_upstream_returns_connection_error_document() {
    // Bind then release a port so nothing listens on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let relay = spawn_relay(&format!("http://127.0.0.1:{}", port)).await;

    let response = post_analysis(&relay.url("/analysis")).await;
    assert_eq!(response.status(), 502);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["code"], "CONNECTION_ERROR");
}

#[tokio::test]
async fn test_malformed_line_is_reported_and_stream_continues() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "data: {\"message\":\"분석을 시작합니다...\"}\n\n",
        "data: {broken\n\n",
        "data: {\"message\":\"텍스트를 처리하는 중입니다...\"}\n\n",
        "event: done\ndata: {}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let relay = spawn_relay(&mock_server.uri()).await;
    let records = run_session(&relay, "hello").await;

    assert_eq!(records.len(), 4);
    assert_eq!(records[1].code.as_deref(), Some("PARSE_ERROR"));
    assert_eq!(records[1].phase, PhaseLabel::Analyzing);
    assert_eq!(records[2].phase, PhaseLabel::Processing);
    assert_eq!(records[3].phase, PhaseLabel::Complete);
}

#[tokio::test]
async fn test_silent_upstream_close_ends_stream() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"message\":\"처리 중\"}\n\ndata: {\"mess",
            "text/event-stream",
        ))
        .mount(&mock_server)
        .await;

    let relay = spawn_relay(&mock_server.uri()).await;
    let records = run_session(&relay, "hello").await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].phase, PhaseLabel::Processing);
    assert_eq!(
        relay
            .metrics
            .session_outcomes_total
            .with_label_values(&["silent_close"])
            .get(),
        1.0
    );
}

#[tokio::test]
async fn test_invalid_request_never_reaches_upstream() {
    let mock_server = MockServer::start().await;
    let relay = spawn_relay(&mock_server.uri()).await;

    let response = reqwest::Client::new()
        .post(relay.url("/analysis"))
        .json(&serde_json::json!({ "text": "" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"]["type"], "invalid_request_error");
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relay_stream_is_event_stream() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("event: done\ndata: {}\n\n", "text/event-stream"),
        )
        .mount(&mock_server)
        .await;

    let relay = spawn_relay(&mock_server.uri()).await;
    let response = post_analysis(&relay.url("/analysis")).await;
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    // Every data line is one JSON record
    let events: Vec<_> = eventsource_stream::EventStream::new(response.bytes_stream())
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    let record: serde_json::Value = serde_json::from_str(&events[0].as_ref().unwrap().data).unwrap();
    assert_eq!(record["phase"], "완료");
}
