
use super::{DOCUMENTS_TABLE, cosine_distance_to_score};
use crate::database::{DocumentIndex, EmbeddedDocument, MetadataFilter, ScoredDocument};
use crate::documents::{Document, DocumentMetadata, DocumentType};
use crate::{F1RagError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, ListArray, ListBuilder, RecordBatchIterator,
    StringArray, StringBuilder, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    /// Dimension new tables are created with
    vector_dimension: usize,
    /// Dimension of the table currently on disk
    table_dimension: AtomicUsize,
}

impl VectorStore {
    /// Open the store under the configured vector database path
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, F1RagError> {
        Self::open(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await
    }

    /// Open or create the document table at `db_path`
    #[inline]
    pub async fn open(db_path: &Path, vector_dimension: usize) -> Result<Self, F1RagError> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            F1RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.display().to_string();

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt") || error_msg.contains("malformed") {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        F1RagError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(F1RagError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let store = Self {
            connection,
            table_name: DOCUMENTS_TABLE.to_string(),
            vector_dimension,
            table_dimension: AtomicUsize::new(vector_dimension),
        };

        store.initialize_table().await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.table_dimension.load(Ordering::Relaxed)
    }

    async fn initialize_table(&self) -> Result<(), F1RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != self.vector_dimension {
                warn!(
                    "Document table has {} dimensions but the embedding model is configured for {}; re-seed with --clear",
                    existing, self.vector_dimension
                );
            }
            self.table_dimension.store(existing, Ordering::Relaxed);
            return Ok(());
        }

        self.create_table().await
    }

    async fn create_table(&self) -> Result<(), F1RagError> {
        let schema = create_schema(self.vector_dimension);

        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to create table: {}", e)))?;

        self.table_dimension
            .store(self.vector_dimension, Ordering::Relaxed);
        info!(
            "Document table created with {} dimensions",
            self.vector_dimension
        );
        Ok(())
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, F1RagError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(F1RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    async fn open_table(&self) -> Result<Table, F1RagError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to open table: {}", e)))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), F1RagError> {
        let expected = self.vector_dimension();
        if vector.len() != expected {
            return Err(F1RagError::Database(format!(
                "Vector has {} dimensions but the document table expects {}",
                vector.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Create a RecordBatch from embedded documents
    fn create_record_batch(&self, records: &[EmbeddedDocument]) -> Result<RecordBatch, F1RagError> {
        let len = records.len();
        let vector_dim = self.vector_dimension();

        let mut ids = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut doc_types = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut urls = Vec::with_capacity(len);
        let mut seasons = Vec::with_capacity(len);
        let mut rounds = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut entities = ListBuilder::new(StringBuilder::new());

        for record in records {
            self.check_dimension(&record.vector)?;

            let document = &record.document;
            let metadata = &document.metadata;
            ids.push(document.id.as_str());
            contents.push(document.content.as_str());
            sources.push(metadata.source.as_str());
            doc_types.push(metadata.doc_type.as_str());
            dates.push(metadata.date.format(DATE_FORMAT).to_string());
            titles.push(metadata.title.as_deref());
            urls.push(metadata.url.as_deref());
            seasons.push(metadata.season);
            rounds.push(metadata.round);
            flat_values.extend_from_slice(&record.vector);

            for entity in &metadata.entities {
                entities.values().append_value(entity);
            }
            entities.append(true);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    F1RagError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(doc_types)),
            Arc::new(StringArray::from(dates)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(urls)),
            Arc::new(entities.finish()),
            Arc::new(UInt32Array::from(seasons)),
            Arc::new(UInt32Array::from(rounds)),
        ];

        RecordBatch::try_new(create_schema(vector_dim), arrays)
            .map_err(|e| F1RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<ScoredDocument>, F1RagError> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(parse_search_batch(&batch_result)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), F1RagError> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path: PathBuf = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                F1RagError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        info!("Database corruption recovery completed");
        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<(), F1RagError> {
        let table_names =
            self.connection.table_names().execute().await.map_err(|e| {
                F1RagError::Database(format!("Failed to list tables for drop: {}", e))
            })?;

        if table_names.contains(&self.table_name) {
            info!("Dropping existing document table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| F1RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentIndex for VectorStore {
    #[inline]
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>, F1RagError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(vector)?;

        debug!("Searching for similar documents with limit: {}", limit);

        let table = self.open_table().await?;

        let mut query = table
            .vector_search(vector)
            .map_err(|e| F1RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(predicate) = filter.and_then(MetadataFilter::to_predicate) {
            debug!("Applying metadata filter: {}", predicate);
            query = query.only_if(predicate);
        }

        let results = query
            .execute()
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = self.parse_search_results_stream(results).await?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }

    #[inline]
    async fn upsert(&self, documents: Vec<EmbeddedDocument>) -> Result<usize, F1RagError> {
        if documents.is_empty() {
            debug!("No documents to store");
            return Ok(0);
        }

        // Later entries for the same id replace earlier ones
        let mut position_by_id: HashMap<String, usize> = HashMap::new();
        let mut unique: Vec<EmbeddedDocument> = Vec::with_capacity(documents.len());
        for record in documents {
            match position_by_id.get(&record.document.id) {
                Some(&index) => unique[index] = record,
                None => {
                    position_by_id.insert(record.document.id.clone(), unique.len());
                    unique.push(record);
                }
            }
        }

        debug!("Upserting batch of {} documents", unique.len());

        let record_batch = self.create_record_batch(&unique)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to upsert documents: {}", e)))?;

        info!("Upserted {} documents", unique.len());
        Ok(unique.len())
    }

    #[inline]
    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64, F1RagError> {
        let table = self.open_table().await?;

        let count = table
            .count_rows(filter.and_then(MetadataFilter::to_predicate))
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    #[inline]
    async fn delete(&self, filter: &MetadataFilter) -> Result<u64, F1RagError> {
        let Some(predicate) = filter.to_predicate() else {
            return Err(F1RagError::Database(
                "Refusing to delete without a filter; clear the store instead".to_string(),
            ));
        };

        let table = self.open_table().await?;
        let matching = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to count rows: {}", e)))?;

        table
            .delete(&predicate)
            .await
            .map_err(|e| F1RagError::Database(format!("Failed to delete documents: {}", e)))?;

        info!("Deleted {} documents matching {}", matching, predicate);
        Ok(matching as u64)
    }

    #[inline]
    async fn clear(&self) -> Result<(), F1RagError> {
        self.drop_table_if_exists().await?;
        self.create_table().await?;

        info!("Document table cleared");
        Ok(())
    }
}

/// Schema of the document table for a given vector dimension
fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("doc_type", DataType::Utf8, false),
        Field::new("date", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("url", DataType::Utf8, true),
        Field::new(
            "entities",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            false,
        ),
        Field::new("season", DataType::UInt32, true),
        Field::new("round", DataType::UInt32, true),
    ]))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, F1RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| F1RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| F1RagError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, F1RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| F1RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| F1RagError::Database(format!("Invalid {} column type", name)))
}

fn optional_string(column: &StringArray, row: usize) -> Option<String> {
    (!column.is_null(row)).then(|| column.value(row).to_string())
}

fn optional_u32(column: &UInt32Array, row: usize) -> Option<u32> {
    (!column.is_null(row)).then(|| column.value(row))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredDocument>, F1RagError> {
    let ids = string_column(batch, "id")?;
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let doc_types = string_column(batch, "doc_type")?;
    let dates = string_column(batch, "date")?;
    let titles = string_column(batch, "title")?;
    let urls = string_column(batch, "url")?;
    let seasons = u32_column(batch, "season")?;
    let rounds = u32_column(batch, "round")?;
    let entities = batch
        .column_by_name("entities")
        .ok_or_else(|| F1RagError::Database("Missing entities column".to_string()))?
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| F1RagError::Database("Invalid entities column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| F1RagError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| F1RagError::Database("Invalid _distance column type".to_string()))?;

    let mut results = Vec::with_capacity(batch.num_rows());

    for row in 0..batch.num_rows() {
        let doc_type: DocumentType = doc_types
            .value(row)
            .parse()
            .map_err(|e| F1RagError::Database(format!("Corrupt doc_type in row {}: {}", row, e)))?;
        let date = NaiveDate::parse_from_str(dates.value(row), DATE_FORMAT).map_err(|e| {
            F1RagError::Database(format!("Corrupt date in row {}: {}", row, e))
        })?;

        let row_entities = entities.value(row);
        let row_entities = row_entities
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| F1RagError::Database("Invalid entities item type".to_string()))?;

        let metadata = DocumentMetadata {
            source: sources.value(row).to_string(),
            doc_type,
            date,
            title: optional_string(titles, row),
            entities: row_entities
                .iter()
                .flatten()
                .map(str::to_string)
                .collect(),
            url: optional_string(urls, row),
            season: optional_u32(seasons, row),
            round: optional_u32(rounds, row),
        };

        if distances.is_null(row) {
            return Err(F1RagError::Database(format!("Missing distance for row {}", row)));
        }

        results.push(ScoredDocument::new(
            Document::with_id(ids.value(row), contents.value(row), metadata),
            cosine_distance_to_score(distances.value(row)),
        ));
    }

    Ok(results)
}
