#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Seeding and retrieval against a real LanceDB store with a keyword embedder

mod common;

use common::{DIMENSION, KeywordEmbedder, init_test_tracing, news_documents, race_weekend};
use f1_rag::config::RetrievalConfig;
use f1_rag::database::{DocumentIndex, MetadataFilter, VectorStore};
use f1_rag::documents::DocumentType;
use f1_rag::documents::facts::historical_facts;
use f1_rag::indexer::DocumentIndexer;
use f1_rag::retrieval::{NO_CONTEXT_AVAILABLE, RetrievalResult, Retriever};
use std::sync::Arc;
use tempfile::TempDir;

struct Pipeline {
    store: Arc<VectorStore>,
    indexer: DocumentIndexer,
    retriever: Retriever,
    _temp_dir: TempDir,
}

async fn pipeline() -> Pipeline {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(
        VectorStore::open(temp_dir.path(), DIMENSION)
            .await
            .expect("should open vector store"),
    );
    let embedder = Arc::new(KeywordEmbedder);

    let indexer = DocumentIndexer::new(embedder.clone(), store.clone(), 2);
    let retriever = Retriever::new(embedder, store.clone(), RetrievalConfig::default());

    Pipeline {
        store,
        indexer,
        retriever,
        _temp_dir: temp_dir,
    }
}

fn titles(result: &RetrievalResult) -> Vec<&str> {
    result
        .documents()
        .map(|d| d.metadata.display_name())
        .collect()
}

#[tokio::test]
async fn named_entities_retrieve_both_subjects() {
    let pipeline = pipeline().await;
    pipeline
        .indexer
        .index_documents(news_documents(), false)
        .await
        .expect("seeding should succeed");

    let result = pipeline
        .retriever
        .hybrid_retrieve("Tell me about Verstappen and Ferrari", 5)
        .await
        .expect("retrieval should succeed");

    assert_eq!(
        titles(&result),
        vec!["Ferrari unveils SF-25", "Verstappen wins Japanese Grand Prix"]
    );
    let scores = result.scores();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
    assert!(scores.iter().all(|score| (0.7..=1.0).contains(score)));
    assert!(
        result
            .context()
            .starts_with("[Source 1: Ferrari unveils SF-25]\n")
    );
}

#[tokio::test]
async fn question_without_entities_finds_nothing_relevant() {
    let pipeline = pipeline().await;
    pipeline
        .indexer
        .index_documents(news_documents(), false)
        .await
        .expect("seeding should succeed");

    let result = pipeline
        .retriever
        .hybrid_retrieve("What are the current driver standings?", 5)
        .await
        .expect("retrieval should succeed");

    assert!(result.is_empty());
    assert_eq!(result.context(), NO_CONTEXT_AVAILABLE);
}

#[tokio::test]
async fn entity_filter_on_stored_documents() {
    let pipeline = pipeline().await;
    pipeline
        .indexer
        .index_documents(news_documents(), false)
        .await
        .expect("seeding should succeed");

    let result = pipeline
        .retriever
        .retrieve_by_entity("Verstappen at Suzuka", "suzuka", 3)
        .await
        .expect("retrieval should succeed");

    assert_eq!(titles(&result), vec!["Verstappen wins Japanese Grand Prix"]);
}

#[tokio::test]
async fn reseeding_is_idempotent() {
    let pipeline = pipeline().await;

    for _ in 0..2 {
        let stats = pipeline
            .indexer
            .index_documents(news_documents(), false)
            .await
            .expect("seeding should succeed");
        assert_eq!(stats.documents_indexed, 4);
    }

    assert_eq!(pipeline.store.count(None).await.expect("should count"), 4);
}

#[tokio::test]
async fn facts_and_news_can_be_pruned_separately() {
    let pipeline = pipeline().await;
    let mut documents = historical_facts(race_weekend());
    documents.extend(news_documents());
    pipeline
        .indexer
        .index_documents(documents, false)
        .await
        .expect("seeding should succeed");

    let historical = MetadataFilter::by_type(DocumentType::Historical);
    assert_eq!(
        pipeline
            .store
            .count(Some(&historical))
            .await
            .expect("should count"),
        3
    );

    let removed = pipeline
        .indexer
        .prune(&MetadataFilter::by_type(DocumentType::News))
        .await
        .expect("prune should succeed");
    assert_eq!(removed, 4);
    assert_eq!(pipeline.store.count(None).await.expect("should count"), 3);
}

#[tokio::test]
async fn clear_then_seed_replaces_contents() {
    let pipeline = pipeline().await;
    pipeline
        .indexer
        .index_documents(historical_facts(race_weekend()), false)
        .await
        .expect("first seed should succeed");

    pipeline
        .indexer
        .index_documents(news_documents(), true)
        .await
        .expect("second seed should succeed");

    assert_eq!(pipeline.store.count(None).await.expect("should count"), 4);
    let historical = MetadataFilter::by_type(DocumentType::Historical);
    assert_eq!(
        pipeline
            .store
            .count(Some(&historical))
            .await
            .expect("should count"),
        0
    );
}

#[tokio::test]
async fn documents_survive_reopen() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");

    {
        let store = Arc::new(
            VectorStore::open(temp_dir.path(), DIMENSION)
                .await
                .expect("should open vector store"),
        );
        DocumentIndexer::new(Arc::new(KeywordEmbedder), store, 8)
            .index_documents(news_documents(), false)
            .await
            .expect("seeding should succeed");
    }

    let reopened = VectorStore::open(temp_dir.path(), DIMENSION)
        .await
        .expect("should reopen vector store");
    assert_eq!(reopened.count(None).await.expect("should count"), 4);
}
