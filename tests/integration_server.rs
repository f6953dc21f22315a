#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// HTTP API over a real LanceDB store, a keyword embedder and a stub generator

mod common;

use async_trait::async_trait;
use common::{DIMENSION, KeywordEmbedder, init_test_tracing, news_documents};
use f1_rag::config::RetrievalConfig;
use f1_rag::database::VectorStore;
use f1_rag::generation::{GenerationRequest, TextGenerator, TextStream};
use f1_rag::indexer::DocumentIndexer;
use f1_rag::retrieval::Retriever;
use f1_rag::server::{AppState, router};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

/// Replies with how many sources the system prompt carried
struct SourceCounter;

#[async_trait]
impl TextGenerator for SourceCounter {
    async fn stream_chat(&self, request: GenerationRequest) -> anyhow::Result<TextStream> {
        let summary = format!("{} sources", request.system.matches("[Source ").count());
        let (tx, stream) = TextStream::channel();
        tokio::spawn(async move {
            for fragment in ["Answer ".to_string(), "grounded in ".to_string(), summary] {
                if tx.send(Ok(fragment)).await.is_err() {
                    break;
                }
            }
        });
        Ok(stream)
    }
}

async fn spawn_app() -> (String, TempDir) {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(
        VectorStore::open(temp_dir.path(), DIMENSION)
            .await
            .expect("should open vector store"),
    );
    let embedder = Arc::new(KeywordEmbedder);

    DocumentIndexer::new(embedder.clone(), store.clone(), 4)
        .index_documents(news_documents(), false)
        .await
        .expect("seeding should succeed");

    let retriever = Retriever::new(embedder, store.clone(), RetrievalConfig::default());
    let state = AppState::new(retriever, store, Arc::new(SourceCounter), 5);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind test listener");
    let address = listener.local_addr().expect("should have local address");
    tokio::spawn(async move {
        axum::serve(listener, router(state))
            .await
            .expect("server should run");
    });

    (format!("http://{address}"), temp_dir)
}

async fn ask(base_url: &str, question: &str) -> String {
    let response = Client::new()
        .post(format!("{base_url}/api/chat"))
        .json(&json!({ "messages": [{ "role": "user", "content": question }] }))
        .send()
        .await
        .expect("chat request should complete");
    assert_eq!(response.status(), StatusCode::OK);
    response.text().await.expect("should read chat body")
}

#[tokio::test]
async fn chat_uses_retrieved_sources() {
    let (base_url, _temp_dir) = spawn_app().await;

    assert_eq!(
        ask(&base_url, "Tell me about Verstappen and Ferrari").await,
        "Answer grounded in 2 sources"
    );
    assert_eq!(
        ask(&base_url, "What are the current driver standings?").await,
        "Answer grounded in 0 sources"
    );
}

#[tokio::test]
async fn search_by_type_and_status() {
    let (base_url, _temp_dir) = spawn_app().await;
    let client = Client::new();

    let body: Value = client
        .post(format!("{base_url}/api/search"))
        .json(&json!({ "query": "Norris and McLaren", "doc_type": "news" }))
        .send()
        .await
        .expect("search request should complete")
        .json()
        .await
        .expect("should parse search body");
    assert_eq!(body["sources"][0]["title"], "Norris fastest in practice");
    assert_eq!(body["documents"][0]["metadata"]["type"], "news");

    let none: Value = client
        .post(format!("{base_url}/api/search"))
        .json(&json!({ "query": "Norris and McLaren", "doc_type": "standings" }))
        .send()
        .await
        .expect("search request should complete")
        .json()
        .await
        .expect("should parse search body");
    assert_eq!(none["documents"], json!([]));
    assert_eq!(none["context"], f1_rag::retrieval::NO_CONTEXT_AVAILABLE);

    let status: Value = client
        .get(format!("{base_url}/api/status"))
        .send()
        .await
        .expect("status request should complete")
        .json()
        .await
        .expect("should parse status body");
    assert_eq!(status["status"], "ok");
    assert_eq!(status["documents_in_database"], 4);
}
