// Indexer module
// Seeding pipeline: dedupe documents, embed their enriched text in batches, upsert


use std::collections::HashMap;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::database::{DocumentIndex, EmbeddedDocument, MetadataFilter};
use crate::documents::Document;
use crate::embeddings::Embedder;
use crate::{F1RagError, Result};

/// Counters reported after a seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub documents_received: usize,
    pub duplicates_skipped: usize,
    pub documents_indexed: usize,
    pub batches: usize,
}

/// Embeds documents and writes them to a [`DocumentIndex`]
#[derive(Clone)]
pub struct DocumentIndexer {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn DocumentIndex>,
    batch_size: usize,
}

impl DocumentIndexer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn DocumentIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed and upsert `documents`, optionally emptying the index first.
    ///
    /// Documents sharing an id collapse to the last one given. A failed batch
    /// aborts the run; batches already written stay in the index.
    #[inline]
    pub async fn index_documents(
        &self,
        documents: Vec<Document>,
        clear: bool,
    ) -> Result<IndexingStats> {
        let mut stats = IndexingStats {
            documents_received: documents.len(),
            ..IndexingStats::default()
        };

        if clear {
            info!("Clearing existing documents before seeding");
            self.index.clear().await?;
        }

        let unique = dedupe_by_id(documents);
        stats.duplicates_skipped = stats.documents_received - unique.len();
        if stats.duplicates_skipped > 0 {
            warn!("Skipping {} documents with duplicate ids", stats.duplicates_skipped);
        }
        if unique.is_empty() {
            info!("No documents to index");
            return Ok(stats);
        }

        let bar = progress_bar(unique.len() as u64);
        info!(
            "Indexing {} documents in batches of {}",
            unique.len(),
            self.batch_size
        );

        for batch in unique.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(Document::embedding_text).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| F1RagError::Embedding(format!("{e:#}")))?;

            if vectors.len() != batch.len() {
                return Err(F1RagError::Embedding(format!(
                    "Expected {} embeddings but received {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            let records: Vec<EmbeddedDocument> = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(document, vector)| EmbeddedDocument { document, vector })
                .collect();

            let written = self.index.upsert(records).await?;
            stats.documents_indexed += written;
            stats.batches += 1;
            bar.inc(batch.len() as u64);
            debug!("Upserted batch {} ({} documents)", stats.batches, written);
        }

        bar.finish_and_clear();
        info!(
            "Indexed {} documents in {} batches",
            stats.documents_indexed, stats.batches
        );
        Ok(stats)
    }

    /// Delete every document matching `filter`, which must constrain something
    #[inline]
    pub async fn prune(&self, filter: &MetadataFilter) -> Result<u64> {
        if filter.is_empty() {
            return Err(F1RagError::Config(
                "Refusing to prune without a source, type or season filter".to_string(),
            ));
        }

        let removed = self.index.delete(filter).await?;
        info!("Pruned {} documents", removed);
        Ok(removed)
    }

    #[inline]
    pub async fn document_count(&self) -> Result<u64> {
        self.index.count(None).await
    }
}

/// Keep one document per id, the last occurrence winning, in first-seen order
fn dedupe_by_id(documents: Vec<Document>) -> Vec<Document> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(documents.len());
    let mut unique: Vec<Document> = Vec::with_capacity(documents.len());

    for document in documents {
        if let Some(&position) = positions.get(&document.id) {
            unique[position] = document;
        } else {
            positions.insert(document.id.clone(), unique.len());
            unique.push(document);
        }
    }

    unique
}

fn progress_bar(len: u64) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding documents") {
        bar.set_style(style);
    }
    bar
}
