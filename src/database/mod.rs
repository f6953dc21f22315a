// Database module
// Vector storage behind the DocumentIndex trait, backed by LanceDB

pub mod lancedb;


use async_trait::async_trait;
use serde::Serialize;

use crate::Result;
use crate::documents::{Document, DocumentType};

pub use self::lancedb::vector_store::VectorStore;

/// A document paired with its similarity to a query, in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

impl ScoredDocument {
    #[inline]
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }
}

/// A document ready for storage together with its embedding
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub document: Document,
    pub vector: Vec<f32>,
}

/// Exact-match constraints on document metadata; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub doc_type: Option<DocumentType>,
    pub source: Option<String>,
    pub season: Option<u32>,
}

impl MetadataFilter {
    #[inline]
    pub fn by_type(doc_type: DocumentType) -> Self {
        Self {
            doc_type: Some(doc_type),
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.source.is_none() && self.season.is_none()
    }

    /// SQL predicate for the filter, `None` when it matches everything
    #[inline]
    pub fn to_predicate(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(doc_type) = self.doc_type {
            clauses.push(format!("doc_type = '{}'", doc_type.as_str()));
        }
        if let Some(source) = &self.source {
            clauses.push(format!("source = '{}'", source.replace('\'', "''")));
        }
        if let Some(season) = self.season {
            clauses.push(format!("season = {}", season));
        }

        (!clauses.is_empty()).then(|| clauses.join(" AND "))
    }

    /// Check a document against the filter without going through the store
    #[inline]
    pub fn matches(&self, document: &Document) -> bool {
        let metadata = &document.metadata;
        self.doc_type.is_none_or(|t| t == metadata.doc_type)
            && self.source.as_ref().is_none_or(|s| *s == metadata.source)
            && self.season.is_none_or(|s| Some(s) == metadata.season)
    }
}

/// Nearest-neighbour document storage.
///
/// `search` returns at most `limit` hits ordered by descending score.
/// `upsert` replaces documents that share an id, so the last write wins.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>>;

    async fn upsert(&self, documents: Vec<EmbeddedDocument>) -> Result<usize>;

    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64>;

    /// Delete every document matching a non-empty filter, returning how many matched
    async fn delete(&self, filter: &MetadataFilter) -> Result<u64>;

    /// Remove all documents
    async fn clear(&self) -> Result<()>;
}
