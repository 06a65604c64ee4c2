// src/ingest/types.rs
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Broad classification of a feed post's primary content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Image,
    VideoEmbed,
    Audio,
    Link,
    Unknown,
}

impl ContentKind {
    /// Map the platform's `post_type` attribute onto our classification.
    pub fn from_post_type(raw: &str) -> Self {
        let t = raw.to_ascii_lowercase();
        if t.contains("video") {
            ContentKind::VideoEmbed
        } else if t.contains("image") {
            ContentKind::Image
        } else if t.contains("audio") {
            ContentKind::Audio
        } else if t.contains("link") {
            ContentKind::Link
        } else if t.contains("text") {
            ContentKind::Text
        } else {
            ContentKind::Unknown
        }
    }
}

impl Default for ContentKind {
    fn default() -> Self {
        ContentKind::Unknown
    }
}

/// One post from the monitored feed, normalized at the boundary.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    pub id: String,
    pub source_name: String, // creator the post belongs to
    pub title: String,
    pub body: String, // normalized text, may be empty
    pub content_type: ContentKind,
    pub embedded_media_urls: Vec<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Upstream fetch failures, split by what the operator has to do about them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials rejected or expired. Not retried automatically.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Network, rate-limit or server-side trouble. The next scheduled run retries.
    #[error("transient feed error: {0}")]
    Transient(String),
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Item>, FetchError>;
    fn name(&self) -> &'static str;
}
