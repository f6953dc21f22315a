
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::Html;
use std::path::Path;
use tracing::{debug, warn};

use super::{Document, DocumentMetadata, DocumentType};
use crate::F1RagError;
use crate::retrieval::entities::extract_entities;

/// Items kept per feed
pub const DEFAULT_MAX_ITEMS: usize = 10;

/// A parsed RSS channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

/// One `<item>` with its text fields already reduced to plain text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ChannelTitle,
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    fn from_element(name: &[u8], in_item: bool) -> Option<Self> {
        match (name, in_item) {
            (b"title", false) => Some(Field::ChannelTitle),
            (b"title", true) => Some(Field::Title),
            (b"link", true) => Some(Field::Link),
            (b"description", true) => Some(Field::Description),
            (b"pubDate", true) => Some(Field::PubDate),
            _ => None,
        }
    }
}

#[derive(Default)]
struct ItemBuilder {
    title: String,
    link: String,
    description: String,
    pub_date: String,
}

impl ItemBuilder {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::PubDate => &mut self.pub_date,
            Field::ChannelTitle => return,
        };
        target.push_str(text);
    }

    /// Items need both a title and a description to be useful
    fn finish(self) -> Option<FeedItem> {
        let title = clean_html(&self.title);
        let description = clean_html(&self.description);
        if title.is_empty() || description.is_empty() {
            return None;
        }

        let pub_date = self.pub_date.trim();
        Some(FeedItem {
            title,
            link: self.link.trim().to_string(),
            description,
            pub_date: (!pub_date.is_empty()).then(|| pub_date.to_string()),
        })
    }
}

/// Parse an RSS 2.0 document.
///
/// Only `channel/title` and `item/{title, link, description, pubDate}` are
/// read; every other element is ignored, including namespaced extensions
/// like `media:title`. Text may arrive as escaped markup or
/// CDATA, both are decoded and stripped of HTML.
#[inline]
pub fn parse_feed(xml: &str) -> Result<Feed> {
    // Text stays untrimmed; clean_html collapses whitespace per field
    let mut reader = Reader::from_str(xml);

    let mut feed = Feed::default();
    let mut channel_title = String::new();
    let mut item: Option<ItemBuilder> = None;
    let mut field: Option<Field> = None;
    let mut depth_in_field = 0usize;
    let mut ignored_depth = 0usize;
    let mut skipped = 0usize;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("Malformed feed at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(start) => {
                let qname = start.name();
                let name = qname.as_ref();
                if ignored_depth > 0 {
                    ignored_depth += 1;
                } else if field.is_some() {
                    // Markup nested in a text field is kept as text
                    depth_in_field += 1;
                } else if qname.prefix().is_some() {
                    // Extension elements such as <media:content> are skipped whole
                    ignored_depth = 1;
                } else if name == b"item" {
                    item = Some(ItemBuilder::default());
                } else if name == b"title" && item.is_none() && !channel_title.is_empty() {
                    // Only the first channel-level title counts (skip <image><title>)
                } else {
                    field = Field::from_element(name, item.is_some());
                }
            }
            Event::End(end) => {
                let qname = end.name();
                let name = qname.as_ref();
                if ignored_depth > 0 {
                    ignored_depth -= 1;
                } else if depth_in_field > 0 {
                    depth_in_field -= 1;
                } else if field.is_some() {
                    field = None;
                } else if name == b"item" {
                    match item.take().and_then(ItemBuilder::finish) {
                        Some(finished) => feed.items.push(finished),
                        None => skipped += 1,
                    }
                }
            }
            Event::Text(text) => {
                if let Some(current) = field {
                    let decoded = text
                        .unescape_with(resolve_html_entity)
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                    push_text(current, &decoded, &mut item, &mut channel_title);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = field {
                    let raw = String::from_utf8_lossy(&cdata).into_owned();
                    push_text(current, &raw, &mut item, &mut channel_title);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if skipped > 0 {
        debug!("Skipped {} feed items without title or description", skipped);
    }

    let channel_title = clean_html(&channel_title);
    feed.title = (!channel_title.is_empty()).then_some(channel_title);
    Ok(feed)
}

fn push_text(field: Field, text: &str, item: &mut Option<ItemBuilder>, channel_title: &mut String) {
    match (field, item.as_mut()) {
        (Field::ChannelTitle, None) => channel_title.push_str(text),
        (_, Some(builder)) => builder.push(field, text),
        _ => {}
    }
}

fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some(" "),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "rsquo" => Some("\u{2019}"),
        "lsquo" => Some("\u{2018}"),
        "rdquo" => Some("\u{201d}"),
        "ldquo" => Some("\u{201c}"),
        _ => None,
    }
}

/// Reduce an HTML fragment to its text with whitespace collapsed
#[inline]
pub fn clean_html(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return collapse_whitespace(fragment);
    }

    let parsed = Html::parse_fragment(fragment);
    let text: String = parsed.root_element().text().collect();
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"Motorsport.com News"` -> `"motorsport.com-news"`
#[inline]
pub fn source_slug(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Parse an RSS `pubDate`, accepting RFC 2822 then RFC 3339
#[inline]
pub fn parse_pub_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|parsed| parsed.date_naive())
        .ok()
}

impl FeedItem {
    /// Turn the item into a `news` document from `source`
    #[inline]
    pub fn to_document(&self, source: &str, fallback_date: NaiveDate) -> Document {
        let content = format!("{}\n\n{}", self.title, self.description);
        let date = match self.pub_date.as_deref() {
            Some(raw) => parse_pub_date(raw).unwrap_or_else(|| {
                warn!("Unparseable pubDate {:?}, using {}", raw, fallback_date);
                fallback_date
            }),
            None => fallback_date,
        };

        let mut metadata = DocumentMetadata::new(source_slug(source), DocumentType::News, date)
            .with_title(self.title.clone())
            .with_entities(extract_entities(&content));
        if !self.link.is_empty() {
            metadata = metadata.with_url(self.link.clone());
        }

        Document::new(content, metadata)
    }
}

impl Feed {
    /// Convert the first `max_items` items into documents
    #[inline]
    pub fn to_documents(
        &self,
        source: &str,
        max_items: usize,
        fallback_date: NaiveDate,
    ) -> Vec<Document> {
        self.items
            .iter()
            .take(max_items)
            .map(|item| item.to_document(source, fallback_date))
            .collect()
    }
}

/// Read a saved feed file and convert it to documents.
///
/// The channel title names the source; the file stem is used when the
/// channel has no title.
#[inline]
pub fn load_feed_file(
    path: &Path,
    max_items: usize,
    fallback_date: NaiveDate,
) -> crate::Result<Vec<Document>> {
    let xml = std::fs::read_to_string(path).map_err(|e| {
        F1RagError::Feed(format!("Failed to read feed file {}: {}", path.display(), e))
    })?;
    let feed = parse_feed(&xml).map_err(|e| {
        F1RagError::Feed(format!("Failed to parse feed {}: {:#}", path.display(), e))
    })?;

    let source = feed
        .title
        .clone()
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "rss".to_string());

    let documents = feed.to_documents(&source, max_items, fallback_date);
    debug!(
        "Feed {} yielded {} documents from {} items",
        source,
        documents.len(),
        feed.items.len()
    );
    Ok(documents)
}
