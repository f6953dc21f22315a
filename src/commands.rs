use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, get_config_dir, show_config};
use crate::database::{DocumentIndex, MetadataFilter, VectorStore};
use crate::documents::facts::historical_facts;
use crate::documents::rss::{DEFAULT_MAX_ITEMS, load_feed_file};
use crate::documents::{Document, DocumentType, load_jsonl};
use crate::embeddings::OllamaEmbedder;
use crate::generation::{ChatMessage, GenerationRequest, OllamaChat, TextGenerator};
use crate::indexer::{DocumentIndexer, IndexingStats};
use crate::retrieval::{NO_CONTEXT_AVAILABLE, RetrievalResult, Retriever, build_system_prompt};
use crate::server::{AppState, serve};
use crate::vocabulary::VOCABULARY_VERSION;

/// Where seed documents come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOptions {
    pub clear: bool,
    pub include_facts: bool,
    pub rss_files: Vec<PathBuf>,
    pub document_files: Vec<PathBuf>,
    pub max_feed_items: usize,
}

impl Default for SeedOptions {
    #[inline]
    fn default() -> Self {
        Self {
            clear: false,
            include_facts: true,
            rss_files: Vec::new(),
            document_files: Vec::new(),
            max_feed_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// Load configuration from `config_dir`, or from the default directory
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_config_dir()?,
    };
    Config::load(&dir)
        .with_context(|| format!("Failed to load configuration from {}", dir.display()))
}

#[inline]
pub fn configure(config: &Config, show: bool, init: bool) -> Result<()> {
    if init {
        let path = config.config_file_path();
        if path.exists() {
            println!("Configuration already exists at {}", path.display());
        } else {
            config.save()?;
            println!("Wrote default configuration to {}", path.display());
        }
        return Ok(());
    }

    if show {
        return show_config(config);
    }

    println!("Configuration file: {}", config.config_file_path().display());
    println!("Use --show to print it or --init to create it with defaults.");
    Ok(())
}

/// Gather every document a seeding run should index
#[inline]
pub fn collect_documents(options: &SeedOptions, today: NaiveDate) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    if options.include_facts {
        let facts = historical_facts(today);
        info!("Adding {} curated historical facts", facts.len());
        documents.extend(facts);
    }

    for path in &options.rss_files {
        let items = load_feed_file(path, options.max_feed_items, today)?;
        info!("Loaded {} news items from {}", items.len(), path.display());
        documents.extend(items);
    }

    for path in &options.document_files {
        let loaded = load_jsonl(path)?;
        info!("Loaded {} documents from {}", loaded.len(), path.display());
        documents.extend(loaded);
    }

    Ok(documents)
}

#[inline]
pub async fn seed(config: &Config, options: &SeedOptions) -> Result<IndexingStats> {
    let documents = collect_documents(options, Local::now().date_naive())?;
    if documents.is_empty() && !options.clear {
        println!("Nothing to seed. Pass --rss or --documents, or drop --no-facts.");
        return Ok(IndexingStats::default());
    }

    let embedder = OllamaEmbedder::new(config).context("Failed to initialize Ollama embedder")?;
    let client = embedder.client().clone();
    tokio::task::spawn_blocking(move || client.validate_model())
        .await
        .context("Model check task failed")??;

    let store = VectorStore::new(config)
        .await
        .context("Failed to open vector store")?;

    let indexer = DocumentIndexer::new(
        Arc::new(embedder),
        Arc::new(store),
        config.ollama.batch_size as usize,
    );
    let stats = indexer.index_documents(documents, options.clear).await?;

    println!("Seeding complete:");
    println!("  Documents received: {}", stats.documents_received);
    println!("  Duplicates skipped: {}", stats.duplicates_skipped);
    println!("  Documents indexed: {}", stats.documents_indexed);
    println!("  Total in database: {}", indexer.document_count().await?);
    Ok(stats)
}

#[inline]
pub async fn prune(config: &Config, filter: &MetadataFilter) -> Result<u64> {
    let store = VectorStore::new(config)
        .await
        .context("Failed to open vector store")?;
    let embedder = OllamaEmbedder::new(config)?;
    let indexer = DocumentIndexer::new(
        Arc::new(embedder),
        Arc::new(store),
        config.ollama.batch_size as usize,
    );

    let removed = indexer.prune(filter).await?;
    println!("Removed {} documents", removed);
    Ok(removed)
}

async fn open_retriever(config: &Config) -> Result<(Retriever, Arc<VectorStore>)> {
    let store = Arc::new(
        VectorStore::new(config)
            .await
            .context("Failed to open vector store")?,
    );
    let embedder = OllamaEmbedder::for_queries(config)
        .context("Failed to initialize Ollama embedder")?;
    let retriever = Retriever::new(
        Arc::new(embedder),
        Arc::clone(&store) as Arc<dyn DocumentIndex>,
        config.retrieval,
    );
    Ok((retriever, store))
}

#[inline]
pub async fn search(
    config: &Config,
    query: &str,
    entity: Option<&str>,
    doc_type: Option<DocumentType>,
    limit: Option<usize>,
) -> Result<()> {
    let (retriever, _) = open_retriever(config).await?;
    let limit = limit.unwrap_or(config.retrieval.limit);

    let result = match (entity, doc_type) {
        (Some(entity), _) => retriever.retrieve_by_entity(query, entity, limit).await?,
        (None, Some(doc_type)) => retriever.retrieve_by_type(query, doc_type, limit).await?,
        (None, None) => retriever.hybrid_retrieve(query, limit).await?,
    };

    print_results(&result);
    Ok(())
}

fn print_results(result: &RetrievalResult) {
    if result.is_empty() {
        println!("No documents scored above the relevance threshold.");
        return;
    }

    for (rank, hit) in result.hits().iter().enumerate() {
        let metadata = &hit.document.metadata;
        println!(
            "{}. {} [{}] score {:.3}",
            rank + 1,
            metadata.display_name(),
            metadata.doc_type,
            hit.score
        );
        println!("   Source: {} ({})", metadata.source, metadata.date);
        if let Some(url) = &metadata.url {
            println!("   URL: {}", url);
        }
        if !metadata.entities.is_empty() {
            println!("   Entities: {}", metadata.entities.join(", "));
        }
        let preview: String = hit.document.content.chars().take(200).collect();
        println!("   {}", preview.replace('\n', " "));
        println!();
    }
}

/// Answer one question on stdout, streaming the model's reply
#[inline]
pub async fn ask(config: &Config, question: &str) -> Result<()> {
    let (retriever, _) = open_retriever(config).await?;

    let retrieved = match retriever
        .hybrid_retrieve(question, config.retrieval.limit)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!("Retrieval failed, answering from general knowledge: {}", e);
            RetrievalResult::default()
        }
    };
    let context = if retrieved.is_empty() {
        NO_CONTEXT_AVAILABLE.to_string()
    } else {
        retrieved.context()
    };

    let chat = OllamaChat::new(config)?;
    let mut stream = chat
        .stream_chat(GenerationRequest {
            system: build_system_prompt(&context),
            messages: vec![ChatMessage::user(question)],
        })
        .await
        .context("Failed to start generation")?;

    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    if !retrieved.is_empty() {
        writeln!(stdout, "\nSources:")?;
        for source in retrieved.sources() {
            writeln!(
                stdout,
                "  - {} ({}, {:.2})",
                source.title, source.source, source.relevance_score
            )?;
        }
    }
    Ok(())
}

#[inline]
pub async fn serve_http(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let (retriever, store) = open_retriever(config).await?;
    let generator: Arc<dyn TextGenerator> = Arc::new(OllamaChat::new(config)?);

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let state = AppState::new(retriever, store, generator, config.retrieval.limit);
    serve(state, &format!("{host}:{port}")).await
}

#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("F1 RAG status");
    println!("  Config: {}", config.config_file_path().display());
    println!("  Vector database: {}", config.vector_database_path().display());
    println!("  Vocabulary version: {}", VOCABULARY_VERSION);

    let embedder = OllamaEmbedder::for_queries(config)?;
    let client = embedder.client().clone();
    let chat_model = config.ollama.chat_model.clone();
    let ollama = tokio::task::spawn_blocking(move || {
        client.health_check()?;
        client.ensure_model_available(&chat_model)
    })
    .await
    .context("Health check task failed")?;
    match ollama {
        Ok(()) => println!(
            "  Ollama: reachable (embedding {}, chat {})",
            config.ollama.embedding_model, config.ollama.chat_model
        ),
        Err(e) => println!("  Ollama: unavailable ({:#})", e),
    }

    let store = VectorStore::new(config).await?;
    println!("  Documents: {}", store.count(None).await?);
    for doc_type in DocumentType::ALL {
        let count = store.count(Some(&MetadataFilter::by_type(doc_type))).await?;
        if count > 0 {
            println!("    {}: {}", doc_type, count);
        }
    }
    Ok(())
}
