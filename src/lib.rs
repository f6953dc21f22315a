use thiserror::Error;

pub type Result<T> = std::result::Result<T, F1RagError>;

#[derive(Error, Debug)]
pub enum F1RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod generation;
pub mod indexer;
pub mod retrieval;
pub mod server;
pub mod vocabulary;

#[cfg(test)]
pub(crate) mod testing;
