//! In-memory stand-ins for the embedding, index and generation services.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::F1RagError;
use crate::database::{DocumentIndex, EmbeddedDocument, MetadataFilter, ScoredDocument};
use crate::documents::{Document, DocumentMetadata, DocumentType};
use crate::embeddings::Embedder;
use crate::generation::{GenerationRequest, TextGenerator, TextStream};

pub(crate) fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 9).expect("should build date")
}

pub(crate) fn document(id: &str, content: &str, entities: &[&str]) -> Document {
    let metadata = DocumentMetadata::new("test", DocumentType::News, test_date())
        .with_title(format!("Doc {id}"))
        .with_entities(entities.iter().copied());
    Document::with_id(id, content, metadata)
}

pub(crate) fn scored(id: &str, score: f32) -> ScoredDocument {
    ScoredDocument::new(document(id, &format!("Content of {id}"), &[]), score)
}

/// Encodes text as one float per character so the index can recover the query
pub(crate) fn encode(text: &str) -> Vec<f32> {
    text.chars().map(|c| c as u32 as f32).collect()
}

pub(crate) fn decode(vector: &[f32]) -> String {
    vector
        .iter()
        .filter_map(|v| char::from_u32(*v as u32))
        .collect()
}

#[derive(Default)]
pub(crate) struct FakeEmbedder {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock should not be poisoned").clone()
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn dimension(&self) -> usize {
        0
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls
            .lock()
            .expect("lock should not be poisoned")
            .push(text.to_string());
        if self.failing.contains(text) {
            anyhow::bail!("embedding service unavailable for {text:?}");
        }
        Ok(encode(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchCall {
    pub query: String,
    pub limit: usize,
    pub filter: Option<MetadataFilter>,
}

/// Index returning scripted hits per query text, and storing upserts in memory
#[derive(Default)]
pub(crate) struct ScriptedIndex {
    hits: HashMap<String, Vec<ScoredDocument>>,
    failing: HashSet<String>,
    searches: Mutex<Vec<SearchCall>>,
    stored: Mutex<Vec<EmbeddedDocument>>,
}

impl ScriptedIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_hits(mut self, query: &str, hits: Vec<ScoredDocument>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub(crate) fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub(crate) fn searches(&self) -> Vec<SearchCall> {
        self.searches
            .lock()
            .expect("lock should not be poisoned")
            .clone()
    }

    pub(crate) fn stored(&self) -> Vec<EmbeddedDocument> {
        self.stored
            .lock()
            .expect("lock should not be poisoned")
            .clone()
    }
}

#[async_trait]
impl DocumentIndex for ScriptedIndex {
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> crate::Result<Vec<ScoredDocument>> {
        let query = decode(vector);
        self.searches
            .lock()
            .expect("lock should not be poisoned")
            .push(SearchCall {
                query: query.clone(),
                limit,
                filter: filter.cloned(),
            });

        if self.failing.contains(&query) {
            return Err(F1RagError::Database(format!("search failed for {query:?}")));
        }

        let mut hits: Vec<ScoredDocument> = self
            .hits
            .get(&query)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|hit| filter.is_none_or(|f| f.matches(&hit.document)))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert(&self, documents: Vec<EmbeddedDocument>) -> crate::Result<usize> {
        let mut stored = self.stored.lock().expect("lock should not be poisoned");
        let count = documents.len();
        for record in documents {
            stored.retain(|existing| existing.document.id != record.document.id);
            stored.push(record);
        }
        Ok(count)
    }

    async fn count(&self, filter: Option<&MetadataFilter>) -> crate::Result<u64> {
        let stored = self.stored.lock().expect("lock should not be poisoned");
        Ok(stored
            .iter()
            .filter(|record| filter.is_none_or(|f| f.matches(&record.document)))
            .count() as u64)
    }

    async fn delete(&self, filter: &MetadataFilter) -> crate::Result<u64> {
        let mut stored = self.stored.lock().expect("lock should not be poisoned");
        let before = stored.len();
        stored.retain(|record| !filter.matches(&record.document));
        Ok((before - stored.len()) as u64)
    }

    async fn clear(&self) -> crate::Result<()> {
        self.stored
            .lock()
            .expect("lock should not be poisoned")
            .clear();
        Ok(())
    }
}

/// Generator that replays fixed fragments and records every request
#[derive(Default)]
pub(crate) struct FakeGenerator {
    fragments: Vec<String>,
    fail_start: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub(crate) fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .expect("lock should not be poisoned")
            .clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn stream_chat(&self, request: GenerationRequest) -> Result<TextStream> {
        self.requests
            .lock()
            .expect("lock should not be poisoned")
            .push(request);
        if self.fail_start {
            anyhow::bail!("model is not loaded");
        }

        let (tx, stream) = TextStream::channel();
        let fragments = self.fragments.clone();
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(fragment)).await.is_err() {
                    break;
                }
            }
        });
        Ok(stream)
    }
}
