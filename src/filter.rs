// src/filter.rs
//! Pure notification gating: given one post and one subscription's
//! settings, decide whether a notification should fire. No side effects,
//! no clock, no I/O; gates short-circuit in a fixed order.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::{FilterConfig, Subscription};
use crate::ingest::types::{ContentKind, Item};

/// Hosts we treat as video providers when they appear in an embedded
/// media URL.
fn video_provider_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(youtube\.com|youtu\.be|vimeo\.com|twitch\.tv)").expect("provider regex")
    })
}

/// Direct video file references in free text.
fn video_file_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.(mp4|m4v|mov|webm|avi|mkv)\b").expect("video file regex"))
}

/// Total classification of a post as video content. Same input, same
/// answer; safe to call from anywhere.
pub fn is_video(item: &Item) -> bool {
    if item.content_type == ContentKind::VideoEmbed {
        return true;
    }
    if item
        .embedded_media_urls
        .iter()
        .any(|u| video_provider_re().is_match(u))
    {
        return true;
    }
    video_file_re().is_match(&item.title) || video_file_re().is_match(&item.body)
}

/// First failing gate suppresses the notification.
pub fn should_notify(item: &Item, sub: &Subscription, filters: &FilterConfig) -> bool {
    // Gate 1: the subscription itself.
    if !sub.enabled {
        return false;
    }
    if !filters.enabled_sources.is_empty()
        && !filters
            .enabled_sources
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&sub.name))
    {
        return false;
    }

    // Gate 2: content type.
    if sub.video_only {
        if !is_video(item) {
            return false;
        }
    } else if !sub.content_types.is_empty() {
        if !sub.content_types.contains(&item.content_type) {
            return false;
        }
    } else if filters.exclude_text_only && item.content_type == ContentKind::Text {
        return false;
    }

    // Gate 3: keywords. Subscription keywords and global keywords form one
    // effective set; empty set passes unconditionally.
    let has_keywords = !sub.keywords.is_empty() || !filters.global_keywords.is_empty();
    if has_keywords {
        let haystack = format!("{} {}", item.title, item.body).to_lowercase();
        let hit = sub
            .keywords
            .iter()
            .chain(filters.global_keywords.iter())
            .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()));
        if !hit {
            return false;
        }
    }

    true
}
