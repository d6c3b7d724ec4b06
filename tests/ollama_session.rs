//! A full turn against a mocked model server.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use convocode::chat::{ChatConfig, ChatSession, LogChannelSink, PanelSink, TurnOutcome};
use convocode::{Ollama, RenderFormat};

fn record(thinking: &str, content: &str) -> String {
    serde_json::json!({
        "model": "qwen3:0.6b",
        "created_at": "2025-06-01T10:00:00Z",
        "message": {"role": "assistant", "content": content, "thinking": thinking},
        "done": false,
    })
    .to_string()
}

async fn mock_chat(body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;
    server
}

fn session_for(server: &MockServer) -> ChatSession {
    let config = ChatConfig::new().with_base_url(server.uri());
    let client = Ollama::from_config(&config.client_config()).unwrap();
    ChatSession::new(Arc::new(client), config)
}

#[tokio::test]
async fn streamed_turn_reaches_the_log() {
    let body = [
        record("Let", ""),
        record(" me think", ""),
        record("", "Hi"),
        record("", " there"),
        r#"{"model":"qwen3:0.6b","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#.to_string(),
    ]
    .join("\n");
    let server = mock_chat(body).await;
    let mut session = session_for(&server);

    let turn = session.start_turn("hello").await.unwrap().unwrap();
    let mut sink = LogChannelSink::new(Vec::new());
    assert_eq!(turn.run(&mut sink).await, TurnOutcome::Completed);
    assert_eq!(
        String::from_utf8(sink.into_inner()).unwrap(),
        "[thinking] Let me think\nResponse:\n========\nHi there\n"
    );
}

#[tokio::test]
async fn truncated_stream_fails_the_turn() {
    let server = mock_chat(record("", "Hi")).await;
    let mut session = session_for(&server);

    let turn = session.start_turn("hello").await.unwrap().unwrap();
    let mut sink = LogChannelSink::new(Vec::new());
    let outcome = turn.run(&mut sink).await;
    assert!(matches!(outcome, TurnOutcome::Failed(message) if message.contains("ended before")));
    let output = String::from_utf8(sink.into_inner()).unwrap();
    assert!(output.contains("Hi\nError: "));
}

#[tokio::test]
async fn in_band_error_record_fails_the_turn() {
    let body = [record("", "Hi"), r#"{"error":"model crashed"}"#.to_string()].join("\n");
    let server = mock_chat(body).await;
    let mut session = session_for(&server);

    let turn = session.start_turn("hello").await.unwrap().unwrap();
    let mut sink = LogChannelSink::new(Vec::new());
    assert_eq!(
        turn.run(&mut sink).await,
        TurnOutcome::Failed("Streaming error: model crashed".to_string())
    );
}

#[tokio::test]
async fn unreachable_server_fails_the_turn() {
    let config = ChatConfig::new().with_base_url("http://127.0.0.1:1");
    let client = Ollama::from_config(&config.client_config()).unwrap();
    let mut session = ChatSession::new(Arc::new(client), config);

    let turn = session.start_turn("hello").await.unwrap().unwrap();
    let mut sink = LogChannelSink::new(Vec::new());
    assert!(matches!(turn.run(&mut sink).await, TurnOutcome::Failed(_)));
}

#[tokio::test]
async fn panel_receives_html() {
    let body = [
        record("", "**bold"),
        record("", "**"),
        r#"{"model":"qwen3:0.6b","done":true}"#.to_string(),
    ]
    .join("\n");
    let server = mock_chat(body).await;
    let mut session = session_for(&server).with_format(RenderFormat::Html);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let turn = session.start_turn("hello").await.unwrap().unwrap();
    let mut sink = PanelSink::new(tx);
    assert_eq!(turn.run(&mut sink).await, TurnOutcome::Completed);

    let mut last = None;
    while let Ok(message) = rx.try_recv() {
        last = Some(message);
    }
    let last = serde_json::to_value(last.unwrap()).unwrap();
    assert_eq!(last["command"], "appendResponse");
    assert_eq!(last["text"], "<p><strong>bold</strong></p>\n");
}
