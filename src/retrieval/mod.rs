// Hybrid retrieval pipeline
// Question -> entities -> query variants -> per-variant vector search -> max-score fusion

pub mod context;
pub mod entities;
pub mod expansion;
pub mod fusion;


use futures::future::join_all;
use serde::Serialize;
use serde::ser::SerializeStruct;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::database::{DocumentIndex, MetadataFilter, ScoredDocument};
use crate::documents::{Document, DocumentType};
use crate::embeddings::Embedder;

pub use context::{
    NO_CONTEXT_AVAILABLE, SourceReference, build_system_prompt, format_context,
};
pub use entities::extract_entities;
pub use expansion::{DEFAULT_MAX_QUERY_VARIANTS, expand_query};
pub use fusion::MaxScoreFusion;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to embed query: {0}")]
    Embedding(String),
    #[error("Vector search failed: {0}")]
    Search(String),
    #[error("All {attempted} query variants failed, last error: {last_error}")]
    AllQueriesFailed { attempted: usize, last_error: String },
}

/// Documents ranked by descending score.
///
/// Serializes as parallel `documents` and `scores` arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    hits: Vec<ScoredDocument>,
}

impl RetrievalResult {
    /// Wrap hits, re-sorting them by descending score
    #[inline]
    pub fn from_hits(mut hits: Vec<ScoredDocument>) -> Self {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { hits }
    }

    #[inline]
    pub fn hits(&self) -> &[ScoredDocument] {
        &self.hits
    }

    #[inline]
    pub fn into_hits(self) -> Vec<ScoredDocument> {
        self.hits
    }

    #[inline]
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.hits.iter().map(|hit| &hit.document)
    }

    #[inline]
    pub fn scores(&self) -> Vec<f32> {
        self.hits.iter().map(|hit| hit.score).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[inline]
    pub fn sources(&self) -> Vec<SourceReference> {
        self.hits.iter().map(SourceReference::from).collect()
    }

    /// Prompt-ready context for these documents, or the fallback sentinel
    #[inline]
    pub fn context(&self) -> String {
        format_context(self.documents())
    }
}

impl Serialize for RetrievalResult {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let documents: Vec<&Document> = self.documents().collect();
        let mut state = serializer.serialize_struct("RetrievalResult", 2)?;
        state.serialize_field("documents", &documents)?;
        state.serialize_field("scores", &self.scores())?;
        state.end()
    }
}

/// Runs the retrieval pipeline against injected embedding and index services
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn DocumentIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn DocumentIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Embed `query` and return up to `limit` documents scoring at least `min_score`
    #[inline]
    pub async fn retrieve_documents(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult, RetrievalError> {
        debug!("Retrieving up to {} documents for {:?}", limit, query);

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RetrievalError::Embedding(format!("{e:#}")))?;

        let hits = self
            .index
            .search(&vector, limit, filter)
            .await
            .map_err(|e| RetrievalError::Search(e.to_string()))?;

        let min_score = self.config.min_score;
        let total = hits.len();
        let kept: Vec<ScoredDocument> = hits
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .take(limit)
            .collect();

        debug!(
            "Kept {}/{} hits at or above {:.2} for {:?}",
            kept.len(),
            total,
            min_score,
            query
        );
        Ok(RetrievalResult::from_hits(kept))
    }

    /// Retrieval restricted to one document type
    #[inline]
    pub async fn retrieve_by_type(
        &self,
        query: &str,
        doc_type: DocumentType,
        limit: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        let filter = MetadataFilter::by_type(doc_type);
        self.retrieve_documents(query, limit, Some(&filter)).await
    }

    /// Retrieve `2 * limit` candidates and keep those mentioning `entity`.
    ///
    /// A document qualifies when its content or one of its tagged entities
    /// contains `entity`, ignoring case. Fewer than `limit` matches are
    /// returned as-is, never padded.
    #[inline]
    pub async fn retrieve_by_entity(
        &self,
        query: &str,
        entity: &str,
        limit: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        let candidates = self
            .retrieve_documents(query, limit.saturating_mul(2), None)
            .await?;

        let hits: Vec<ScoredDocument> = candidates
            .into_hits()
            .into_iter()
            .filter(|hit| mentions_entity(&hit.document, entity))
            .take(limit)
            .collect();

        debug!("{} documents mention {:?}", hits.len(), entity);
        Ok(RetrievalResult { hits })
    }

    /// Run every query variant concurrently and fuse the hits by maximum score.
    ///
    /// A variant whose embedding or search fails is logged and contributes
    /// nothing. The call fails only when every variant fails.
    #[inline]
    pub async fn multi_query_retrieve(
        &self,
        queries: &[String],
        limit: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        if queries.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let passes = join_all(
            queries
                .iter()
                .map(|query| self.retrieve_documents(query, limit, None)),
        )
        .await;

        let mut fusion = MaxScoreFusion::new();
        let mut failures = 0usize;
        let mut last_error = None;

        for (query, pass) in queries.iter().zip(passes) {
            match pass {
                Ok(result) => fusion.extend(result.into_hits()),
                Err(e) => {
                    warn!("Query variant {:?} failed: {}", query, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == queries.len() {
            return Err(RetrievalError::AllQueriesFailed {
                attempted: queries.len(),
                last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
            });
        }

        let unique = fusion.len();
        let hits = fusion.into_ranked(limit);
        debug!(
            "Fused {} unique documents from {} variants ({} failed), kept {}",
            unique,
            queries.len(),
            failures,
            hits.len()
        );

        Ok(RetrievalResult { hits })
    }

    /// Expand the question into entity-anchored variants, then fuse their results
    #[inline]
    pub async fn hybrid_retrieve(
        &self,
        question: &str,
        limit: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        let queries = expand_query(question, self.config.max_query_variants);
        info!(
            "Hybrid retrieval with {} query variant(s) for {:?}",
            queries.len(),
            question
        );
        self.multi_query_retrieve(&queries, limit).await
    }
}

fn mentions_entity(document: &Document, entity: &str) -> bool {
    entities::mentions(&document.content, entity)
        || document
            .metadata
            .entities
            .iter()
            .any(|tagged| entities::mentions(tagged, entity))
}
