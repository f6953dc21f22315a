use super::ollama::{StreamEnd, forward_ndjson};
use super::*;
use crate::config::Config;
use futures::StreamExt;
use serde_json::json;
use std::io::Cursor;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NDJSON_ANSWER: &str = concat!(
    r#"{"model":"llama3.2:latest","message":{"role":"assistant","content":"Max "},"done":false}"#,
    "\n",
    r#"{"model":"llama3.2:latest","message":{"role":"assistant","content":"Verstappen"},"done":false}"#,
    "\n\n",
    r#"{"model":"llama3.2:latest","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
    "\n",
);

fn config_for(server: &MockServer) -> Config {
    let uri = Url::parse(&server.uri()).expect("mock server uri should parse");
    let mut config = Config::default();
    let host = uri.host_str().expect("mock server should have host");
    config.ollama.host = host.to_string();
    config.ollama.port = uri.port().expect("mock server should have port");
    config
}

fn request() -> GenerationRequest {
    GenerationRequest {
        system: "You are an F1 assistant.".to_string(),
        messages: vec![
            ChatMessage::user("Who won in 2021?"),
            ChatMessage::assistant("Max Verstappen."),
            ChatMessage::user("And 2020?"),
        ],
    }
}

#[test]
fn roles_serialize_lowercase() {
    let message = ChatMessage::user("hi");
    let json = serde_json::to_value(&message).expect("should serialize message");
    assert_eq!(json, json!({ "role": "user", "content": "hi" }));

    let parsed: ChatMessage =
        serde_json::from_value(json!({ "role": "assistant", "content": "ok" }))
            .expect("should parse message");
    assert_eq!(parsed.role, Role::Assistant);

    let unknown_role = json!({ "role": "tool", "content": "x" });
    assert!(serde_json::from_value::<ChatMessage>(unknown_role).is_err());
}

#[test]
fn system_instruction_comes_first() {
    let messages = request().to_messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], ChatMessage::system("You are an F1 assistant."));
    assert_eq!(messages[3], ChatMessage::user("And 2020?"));
}

#[test]
fn forwards_fragments_until_done() {
    let (tx, mut rx) = mpsc::channel(8);
    let end = forward_ndjson(Cursor::new(NDJSON_ANSWER), &tx);
    drop(tx);

    assert_eq!(end, StreamEnd::Completed);
    let mut fragments = Vec::new();
    while let Some(fragment) = rx.blocking_recv() {
        fragments.push(fragment.expect("fragment should be ok"));
    }
    assert_eq!(fragments, vec!["Max ", "Verstappen"]);
}

#[test]
fn stops_when_consumer_is_gone() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    assert_eq!(
        forward_ndjson(Cursor::new(NDJSON_ANSWER), &tx),
        StreamEnd::Cancelled
    );
}

#[test]
fn model_error_is_forwarded() {
    let (tx, mut rx) = mpsc::channel(8);
    let body = r#"{"error":"model 'llama9' not found"}"#;
    assert_eq!(forward_ndjson(Cursor::new(body), &tx), StreamEnd::Failed);

    let first = rx.blocking_recv().expect("should receive error");
    let error = first.expect_err("should be an error");
    assert!(error.to_string().contains("llama9"));
    assert!(matches!(
        error.downcast_ref::<crate::F1RagError>(),
        Some(crate::F1RagError::Generation(_))
    ));
}

#[test]
fn garbage_line_fails_stream() {
    let (tx, mut rx) = mpsc::channel(8);
    assert_eq!(
        forward_ndjson(Cursor::new("not json\n"), &tx),
        StreamEnd::Failed
    );
    assert!(rx.blocking_recv().expect("should receive item").is_err());
}

#[test]
fn missing_done_is_truncated() {
    let (tx, _rx) = mpsc::channel(8);
    let body = r#"{"message":{"role":"assistant","content":"partial"},"done":false}"#;
    assert_eq!(forward_ndjson(Cursor::new(body), &tx), StreamEnd::Truncated);
}

#[tokio::test]
async fn text_stream_yields_in_order() {
    let (tx, mut stream) = TextStream::channel();
    tokio::spawn(async move {
        for fragment in ["Lights ", "out ", "and away we go"] {
            if tx.send(Ok(fragment.to_string())).await.is_err() {
                break;
            }
        }
    });

    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment.expect("fragment should be ok"));
    }
    assert_eq!(text, "Lights out and away we go");
}

#[tokio::test]
async fn collect_text_surfaces_errors() {
    let (tx, stream) = TextStream::channel();
    tx.send(Ok("partial".to_string()))
        .await
        .expect("should send");
    tx.send(Err(anyhow::anyhow!("connection reset")))
        .await
        .expect("should send");
    drop(tx);

    assert!(stream.collect_text().await.is_err());
}

#[tokio::test]
async fn ollama_chat_streams_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.2:latest",
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(NDJSON_ANSWER, "application/x-ndjson"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let chat = OllamaChat::new(&config_for(&server)).expect("should build chat client");
    assert_eq!(chat.model(), "llama3.2:latest");

    let stream = chat
        .stream_chat(request())
        .await
        .expect("should start streaming");
    let text = stream.collect_text().await.expect("should collect text");
    assert_eq!(text, "Max Verstappen");
}

#[tokio::test]
async fn ollama_chat_reports_startup_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OllamaChat::new(&config_for(&server)).expect("should build chat client");
    let error = chat
        .stream_chat(request())
        .await
        .expect_err("a 500 should fail before streaming");
    assert!(matches!(
        error.downcast_ref::<crate::F1RagError>(),
        Some(crate::F1RagError::Generation(_))
    ));
}
