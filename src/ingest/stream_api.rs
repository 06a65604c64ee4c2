// src/ingest/stream_api.rs
//! HTTP client for the platform's stream API. Authenticates with the
//! session cookie header, walks cursor pages, and normalizes the
//! JSON:API-style payload into `Item`s. Entries that don't carry the
//! fields we need are skipped and counted, never fatal.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::CookieJar;
use crate::config::FeedConfig;
use crate::ingest::normalize_text;
use crate::ingest::types::{ContentKind, FeedSource, FetchError, Item};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One fetched page plus the cursor for the next.
#[derive(Debug)]
pub struct FeedPage {
    pub items: Vec<Item>,
    pub next_cursor: Option<String>,
    pub malformed: usize,
}

pub struct StreamApiClient {
    client: reqwest::Client,
    base_url: String,
    cookie_header: String,
    max_pages: u32,
}

impl StreamApiClient {
    pub fn new(cfg: &FeedConfig, jar: &CookieJar) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            cookie_header: jar.header_value(),
            max_pages: cfg.max_pages.max(1),
        })
    }

    /// Fetch a single page of the stream.
    pub async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        let url = format!("{}/api/stream", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("json-api-version", "1.0".to_string()),
            ("include", "user,campaign".to_string()),
        ];
        if let Some(c) = cursor {
            query.push(("page[cursor]", c.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .header("Accept", "application/json")
            .header("Cookie", &self.cookie_header)
            .header("Referer", format!("{}/home", self.base_url))
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("request failed: {e}")))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Auth(format!(
                    "stream API returned {}, session cookies likely expired",
                    resp.status()
                )));
            }
            s if !s.is_success() => {
                return Err(FetchError::Transient(format!("stream API returned {s}")));
            }
            _ => {}
        }

        let payload: StreamResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("decoding stream payload: {e}")))?;

        Ok(parse_stream_page(payload))
    }
}

#[async_trait::async_trait]
impl FeedSource for StreamApiClient {
    async fn fetch_latest(&self) -> Result<Vec<Item>, FetchError> {
        let mut items = Vec::new();
        let mut malformed = 0usize;
        let mut cursor: Option<String> = None;

        for page_no in 0..self.max_pages {
            let page = self.fetch_page(cursor.as_deref()).await?;
            malformed += page.malformed;
            items.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
            debug!(page = page_no + 1, "following stream cursor");
        }

        if malformed > 0 {
            warn!(count = malformed, "skipped malformed stream entries");
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

/* ----------------------------
Payload shapes (tolerant)
---------------------------- */

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    data: Vec<Entry>,
    #[serde(default)]
    included: Vec<Entry>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
struct Entry {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    relationships: Option<Relationships>,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    title: Option<String>,
    content: Option<String>,
    post_type: Option<String>,
    published_at: Option<String>,
    url: Option<String>,
    post_file: Option<FileRef>,
    embed: Option<Embed>,
    // user / campaign attributes from `included`
    full_name: Option<String>,
    vanity: Option<String>,
    creation_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Embed {
    url: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Relationships {
    user: Option<RelRef>,
    campaign: Option<RelRef>,
}

#[derive(Debug, Deserialize)]
struct RelRef {
    data: Option<RelData>,
}

#[derive(Debug, Deserialize)]
struct RelData {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    cursors: Option<Cursors>,
}

#[derive(Debug, Deserialize)]
struct Cursors {
    next: Option<String>,
}

fn parse_stream_page(payload: StreamResponse) -> FeedPage {
    // Resolve creator names from the sideloaded user/campaign entries.
    let mut names: HashMap<String, String> = HashMap::new();
    for inc in &payload.included {
        let (Some(id), Some(kind)) = (&inc.id, &inc.kind) else {
            continue;
        };
        let name = match kind.as_str() {
            "user" => inc
                .attributes
                .full_name
                .clone()
                .or_else(|| inc.attributes.vanity.clone()),
            "campaign" => inc.attributes.creation_name.clone(),
            _ => None,
        };
        if let Some(n) = name {
            names.insert(format!("{kind}:{id}"), n);
        }
    }

    let mut items = Vec::with_capacity(payload.data.len());
    let mut malformed = 0usize;
    for entry in payload.data {
        match parse_post(entry, &names) {
            Some(item) => items.push(item),
            None => malformed += 1,
        }
    }

    let next_cursor = payload
        .meta
        .and_then(|m| m.pagination)
        .and_then(|p| p.cursors)
        .and_then(|c| c.next)
        .filter(|c| !c.is_empty());

    FeedPage {
        items,
        next_cursor,
        malformed,
    }
}

fn parse_post(entry: Entry, names: &HashMap<String, String>) -> Option<Item> {
    let id = entry.id.filter(|i| !i.is_empty())?;
    let attrs = entry.attributes;

    let source_name = entry
        .relationships
        .as_ref()
        .and_then(|r| {
            lookup_name(r.user.as_ref(), "user", names)
                .or_else(|| lookup_name(r.campaign.as_ref(), "campaign", names))
        })
        .unwrap_or_else(|| "Unknown Creator".to_string());

    let mut media = Vec::new();
    if let Some(f) = attrs.post_file.as_ref().and_then(|f| f.url.clone()) {
        media.push(f);
    }
    if let Some(u) = attrs.embed.as_ref().and_then(|e| e.url.clone()) {
        media.push(u);
    }

    let thumbnail = attrs
        .post_file
        .as_ref()
        .and_then(|f| f.url.clone())
        .or_else(|| attrs.embed.as_ref().and_then(|e| e.image.clone()));

    let published_at = attrs
        .published_at
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(Item {
        id,
        source_name,
        title: normalize_text(attrs.title.as_deref().unwrap_or_default()),
        body: normalize_text(attrs.content.as_deref().unwrap_or_default()),
        content_type: attrs
            .post_type
            .as_deref()
            .map(ContentKind::from_post_type)
            .unwrap_or_default(),
        embedded_media_urls: media,
        url: attrs.url,
        thumbnail,
        published_at,
    })
}

fn lookup_name(
    rel: Option<&RelRef>,
    kind: &str,
    names: &HashMap<String, String>,
) -> Option<String> {
    let id = rel?.data.as_ref()?.id.as_ref()?;
    names.get(&format!("{kind}:{id}")).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> &'static str {
        r#"{
            "data": [
                {
                    "id": "101",
                    "type": "post",
                    "attributes": {
                        "title": "New <b>episode</b>",
                        "content": "<p>Watch it now!</p>",
                        "post_type": "video_embed",
                        "published_at": "2026-03-01T10:00:00Z",
                        "url": "/posts/101",
                        "embed": { "url": "https://youtu.be/xyz", "image": "https://img.example/t.jpg" }
                    },
                    "relationships": { "user": { "data": { "id": "u1", "type": "user" } } }
                },
                {
                    "type": "post",
                    "attributes": { "title": "no id, dropped" }
                },
                {
                    "id": "102",
                    "type": "post",
                    "attributes": { "title": "Plain words", "post_type": "text_only" },
                    "relationships": { "campaign": { "data": { "id": "c1", "type": "campaign" } } }
                }
            ],
            "included": [
                { "id": "u1", "type": "user", "attributes": { "full_name": "Ana Artist" } },
                { "id": "c1", "type": "campaign", "attributes": { "creation_name": "Bela's Workshop" } }
            ],
            "meta": { "pagination": { "cursors": { "next": "cur-2" } } }
        }"#
    }

    #[test]
    fn parses_posts_and_resolves_creators() {
        let payload: StreamResponse = serde_json::from_str(fixture()).unwrap();
        let page = parse_stream_page(payload);

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.malformed, 1);
        assert_eq!(page.next_cursor.as_deref(), Some("cur-2"));

        let first = &page.items[0];
        assert_eq!(first.id, "101");
        assert_eq!(first.source_name, "Ana Artist");
        assert_eq!(first.title, "New episode");
        assert_eq!(first.body, "Watch it now!");
        assert_eq!(first.content_type, ContentKind::VideoEmbed);
        assert_eq!(first.embedded_media_urls, vec!["https://youtu.be/xyz"]);
        assert_eq!(first.thumbnail.as_deref(), Some("https://img.example/t.jpg"));
        assert!(first.published_at.is_some());

        let second = &page.items[1];
        assert_eq!(second.source_name, "Bela's Workshop");
        assert_eq!(second.content_type, ContentKind::Text);
    }

    #[test]
    fn absent_pagination_means_no_cursor() {
        let payload: StreamResponse = serde_json::from_str(r#"{ "data": [] }"#).unwrap();
        let page = parse_stream_page(payload);
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn unknown_relationship_falls_back_to_placeholder() {
        let raw = r#"{ "data": [ { "id": "1", "type": "post", "attributes": {} } ] }"#;
        let payload: StreamResponse = serde_json::from_str(raw).unwrap();
        let page = parse_stream_page(payload);
        assert_eq!(page.items[0].source_name, "Unknown Creator");
    }
}
