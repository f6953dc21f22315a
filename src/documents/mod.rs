// Document model shared by ingestion, storage and retrieval
pub mod facts;
pub mod rss;


use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::retrieval::entities::extract_entities;

/// Kind of knowledge a document carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    RaceResult,
    DriverBio,
    TeamInfo,
    News,
    Regulation,
    Stats,
    Qualifying,
    Standings,
    Circuit,
    Historical,
}

impl DocumentType {
    pub const ALL: [DocumentType; 10] = [
        DocumentType::RaceResult,
        DocumentType::DriverBio,
        DocumentType::TeamInfo,
        DocumentType::News,
        DocumentType::Regulation,
        DocumentType::Stats,
        DocumentType::Qualifying,
        DocumentType::Standings,
        DocumentType::Circuit,
        DocumentType::Historical,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::RaceResult => "race_result",
            DocumentType::DriverBio => "driver_bio",
            DocumentType::TeamInfo => "team_info",
            DocumentType::News => "news",
            DocumentType::Regulation => "regulation",
            DocumentType::Stats => "stats",
            DocumentType::Qualifying => "qualifying",
            DocumentType::Standings => "standings",
            DocumentType::Circuit => "circuit",
            DocumentType::Historical => "historical",
        }
    }
}

impl fmt::Display for DocumentType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        DocumentType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown document type: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
}

impl DocumentMetadata {
    #[inline]
    pub fn new(source: impl Into<String>, doc_type: DocumentType, date: NaiveDate) -> Self {
        Self {
            source: source.into(),
            doc_type,
            date,
            title: None,
            entities: Vec::new(),
            url: None,
            season: None,
            round: None,
        }
    }

    /// Title when present and non-empty, otherwise the source
    #[inline]
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(&self.source)
    }

    #[inline]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[inline]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[inline]
    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }

    #[inline]
    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }
}

/// A unit of F1 knowledge stored for retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Build a document whose id is derived from its source, type, title and content
    #[inline]
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        let content = content.into();
        let id = content_id(&metadata, &content);
        Self {
            id,
            content,
            metadata,
        }
    }

    #[inline]
    pub fn with_id(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }

    /// Text handed to the embedding model: metadata header lines, then the content
    #[inline]
    pub fn embedding_text(&self) -> String {
        let metadata = &self.metadata;
        let mut parts: Vec<String> = Vec::with_capacity(5);

        if let Some(title) = metadata.title.as_deref().filter(|t| !t.is_empty()) {
            parts.push(format!("Title: {title}"));
        }
        parts.push(format!("Type: {}", metadata.doc_type.as_str().replace('_', " ")));
        if !metadata.entities.is_empty() {
            parts.push(format!("Related to: {}", metadata.entities.join(", ")));
        }
        if let Some(season) = metadata.season {
            parts.push(format!("Season: {season}"));
        }
        parts.push(self.content.clone());

        parts.join("\n")
    }
}

/// Stable id over the fields that make two documents the same
#[inline]
pub fn content_id(metadata: &DocumentMetadata, content: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [
        metadata.source.as_str(),
        metadata.doc_type.as_str(),
        metadata.title.as_deref().unwrap_or_default(),
        content,
    ] {
        hasher.update(part.as_bytes());
        hasher.update(&[0x1f]);
    }
    hasher.finalize().to_hex().to_string()
}

/// One line of a JSONL import file
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl DocumentDraft {
    /// Finish the draft, tagging entities from the vocabulary when none were given
    #[inline]
    pub fn into_document(self) -> Document {
        let mut metadata = self.metadata;
        if metadata.entities.is_empty() {
            let text = format!(
                "{} {}",
                metadata.title.as_deref().unwrap_or_default(),
                self.content
            );
            metadata.entities = extract_entities(&text)
                .into_iter()
                .map(str::to_string)
                .collect();
        }

        match self.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Document::with_id(id, self.content, metadata),
            None => Document::new(self.content, metadata),
        }
    }
}

/// Parse JSONL drafts; blank lines are skipped, a bad line fails with its line number
#[inline]
pub fn parse_jsonl(input: &str) -> Result<Vec<Document>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<DocumentDraft>(line)
                .map(DocumentDraft::into_document)
                .with_context(|| format!("Invalid document on line {}", index + 1))
        })
        .collect()
}

#[inline]
pub fn load_jsonl(path: &Path) -> Result<Vec<Document>> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents file: {}", path.display()))?;
    parse_jsonl(&input).with_context(|| format!("Failed to parse {}", path.display()))
}
