// src/auth.rs
//! Session-cookie loading. Browser extensions export cookies in two
//! shapes: a JSON array of cookie objects, or a flat name -> value map.
//! Both deserialize into one `CookieJar` at this boundary; the rest of
//! the crate only ever sees the normalized form.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

// Browser exports carry domain/path/expiry too; serde drops what we
// don't model.
#[derive(Debug, Clone, Deserialize)]
struct ExportedCookie {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CookieFile {
    Exported(Vec<ExportedCookie>),
    Map(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CookieJar {
    // insertion order preserved, duplicates by name keep the last value
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading cookie file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing cookie file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: CookieFile = serde_json::from_str(raw).context("cookie file JSON")?;
        let cookies: Vec<(String, String)> = match file {
            CookieFile::Exported(list) => list
                .into_iter()
                .filter(|c| !c.name.is_empty())
                .map(|c| (c.name, c.value))
                .collect(),
            CookieFile::Map(map) => map.into_iter().collect(),
        };
        if cookies.is_empty() {
            bail!("cookie file contains no cookies");
        }
        Ok(Self { cookies })
    }

    /// Value for the `Cookie` request header.
    pub fn header_value(&self) -> String {
        let mut dedup: BTreeMap<&str, &str> = BTreeMap::new();
        for (k, v) in &self.cookies {
            dedup.insert(k, v);
        }
        dedup
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_array_shape_parses() {
        let raw = r#"[
            {"name": "session_id", "value": "abc", "domain": ".example.com", "path": "/"},
            {"name": "device_id", "value": "d1"}
        ]"#;
        let jar = CookieJar::parse(raw).unwrap();
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("session_id"), Some("abc"));
        assert_eq!(jar.header_value(), "device_id=d1; session_id=abc");
    }

    #[test]
    fn flat_map_shape_parses() {
        let raw = r#"{"session_id": "abc", "device_id": "d1"}"#;
        let jar = CookieJar::parse(raw).unwrap();
        assert_eq!(jar.get("device_id"), Some("d1"));
        assert!(jar.header_value().contains("session_id=abc"));
    }

    #[test]
    fn empty_or_garbage_files_are_rejected() {
        assert!(CookieJar::parse("[]").is_err());
        assert!(CookieJar::parse("{}").is_err());
        assert!(CookieJar::parse("not json").is_err());
    }
}
