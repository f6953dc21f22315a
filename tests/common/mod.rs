#![allow(dead_code, reason = "each integration test binary uses a different subset")]

// Shared fixtures for integration tests: a keyword embedder whose cosine
// similarities are predictable, and a handful of F1 news documents.

use async_trait::async_trait;
use chrono::NaiveDate;
use f1_rag::documents::{Document, DocumentMetadata, DocumentType};
use f1_rag::embeddings::Embedder;
use f1_rag::retrieval::extract_entities;

pub const KEYWORDS: &[&str] = &[
    "verstappen",
    "ferrari",
    "norris",
    "mclaren",
    "suzuka",
    "hamilton",
    "monaco",
];

/// Matches the smallest embedding dimension the config accepts
pub const DIMENSION: usize = 64;

const BIAS: f32 = 0.1;

/// One axis per keyword present in `text`, plus a constant bias axis
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector = vec![0.0; DIMENSION];
    for (axis, keyword) in KEYWORDS.iter().enumerate() {
        if lower.contains(keyword) {
            vector[axis] = 1.0;
        }
    }
    vector[KEYWORDS.len()] = BIAS;
    vector
}

pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(keyword_vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| keyword_vector(text)).collect())
    }
}

pub fn race_weekend() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 6).expect("should build date")
}

pub fn news(title: &str, body: &str) -> Document {
    let content = format!("{title}\n\n{body}");
    let metadata = DocumentMetadata::new("paddock-wire", DocumentType::News, race_weekend())
        .with_title(title)
        .with_entities(extract_entities(&content))
        .with_season(2025);
    Document::new(content, metadata)
}

pub fn news_documents() -> Vec<Document> {
    vec![
        news(
            "Verstappen wins Japanese Grand Prix",
            "Verstappen controlled the race at Suzuka from pole.",
        ),
        news(
            "Ferrari unveils SF-25",
            "The Scuderia showed its new car in Maranello.",
        ),
        news(
            "Norris fastest in practice",
            "McLaren topped both sessions on Friday.",
        ),
        news(
            "Hamilton looks back on Monaco",
            "Three wins in the principality.",
        ),
    ]
}

pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}
