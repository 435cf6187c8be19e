//! Short-code URL shortener over a pluggable key-value store.

pub mod json_file;
pub mod memory;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use json_file::JsonFileUrlStore;
pub use memory::MemoryUrlStore;

pub const DEFAULT_CODE_LEN: usize = 6;
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// URL-safe alphabet, same as nanoid.
pub const CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

const MAX_CODE_ATTEMPTS: usize = 16;

pub const MSG_URL_REQUIRED: &str = "URL is required";
pub const MSG_INVALID_URL: &str = "Invalid URL format";
pub const MSG_CODE_REQUIRED: &str = "Code is required";
pub const MSG_URL_NOT_FOUND: &str = "URL not found";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntry {
    pub url: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub clicks: u64,
}

impl UrlEntry {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            created_at: Utc::now(),
            clicks: 0,
        }
    }
}

/// Storage behind the shortener. Implementations serialize their own access.
pub trait UrlStore: Send + Sync {
    fn get(&self, code: &str) -> Result<Option<UrlEntry>>;

    fn set(&self, code: &str, entry: UrlEntry) -> Result<()>;

    /// Code already assigned to `url`, if any.
    fn find_by_url(&self, url: &str) -> Result<Option<String>>;

    /// Returns false when `code` is unknown.
    fn increment_clicks(&self, code: &str) -> Result<bool>;
}

impl<S: UrlStore + ?Sized> UrlStore for Box<S> {
    fn get(&self, code: &str) -> Result<Option<UrlEntry>> {
        (**self).get(code)
    }

    fn set(&self, code: &str, entry: UrlEntry) -> Result<()> {
        (**self).set(code, entry)
    }

    fn find_by_url(&self, url: &str) -> Result<Option<String>> {
        (**self).find_by_url(url)
    }

    fn increment_clicks(&self, code: &str) -> Result<bool> {
        (**self).increment_clicks(code)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenOutcome {
    pub code: String,
    pub short_url: String,
    pub is_existing: bool,
}

pub struct ShortUrlService<S: UrlStore> {
    store: S,
    code_len: usize,
    base_url: String,
}

pub fn generate_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Parse check only; the stored URL is the trimmed input, not the normalized form.
pub fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::InvalidUrl(MSG_URL_REQUIRED.to_string()));
    }
    url::Url::parse(url).map_err(|_| Error::InvalidUrl(MSG_INVALID_URL.to_string()))?;
    Ok(url)
}

impl<S: UrlStore> ShortUrlService<S> {
    pub fn new(store: S, code_len: usize, base_url: &str) -> Self {
        Self {
            store,
            code_len: code_len.max(1),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/s/{code}", self.base_url)
    }

    /// Reuses the existing code when `url` was shortened before.
    pub fn shorten(&self, url: &str) -> Result<ShortenOutcome> {
        let url = validate_url(url)?;
        if let Some(code) = self.store.find_by_url(url)? {
            debug!("{url} already shortened as {code}");
            return Ok(ShortenOutcome {
                short_url: self.short_url(&code),
                code,
                is_existing: true,
            });
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(self.code_len);
            if self.store.get(&code)?.is_some() {
                debug!("code collision on {code}, retrying");
                continue;
            }
            self.store.set(&code, UrlEntry::new(url))?;
            info!("shortened {url} as {code}");
            return Ok(ShortenOutcome {
                short_url: self.short_url(&code),
                code,
                is_existing: false,
            });
        }
        Err(Error::Store(format!(
            "no free {}-character code after {MAX_CODE_ATTEMPTS} attempts",
            self.code_len
        )))
    }

    pub fn lookup(&self, code: &str) -> Result<UrlEntry> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::InvalidInput(MSG_CODE_REQUIRED.to_string()));
        }
        self.store
            .get(code)?
            .ok_or_else(|| Error::NotFound(MSG_URL_NOT_FOUND.to_string()))
    }

    /// Count a visit and return the redirect target.
    pub fn resolve(&self, code: &str) -> Result<String> {
        let entry = self.lookup(code)?;
        self.store.increment_clicks(code.trim())?;
        Ok(entry.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ShortUrlService<MemoryUrlStore> {
        ShortUrlService::new(MemoryUrlStore::new(), DEFAULT_CODE_LEN, "http://short.test/")
    }

    #[test]
    fn codes_use_url_safe_alphabet() {
        let code = generate_code(64);
        assert_eq!(code.len(), 64);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn rejects_missing_and_malformed_urls() {
        let svc = service();
        assert_eq!(svc.shorten("  ").unwrap_err().to_string(), MSG_URL_REQUIRED);
        assert_eq!(svc.shorten("not a url").unwrap_err().to_string(), MSG_INVALID_URL);
    }

    #[test]
    fn shortening_twice_reuses_code() {
        let svc = service();
        let first = svc.shorten("https://example.com/a").expect("shorten");
        assert!(!first.is_existing);
        assert_eq!(first.code.len(), DEFAULT_CODE_LEN);
        assert_eq!(first.short_url, format!("http://short.test/s/{}", first.code));

        let again = svc.shorten("https://example.com/a").expect("shorten");
        assert!(again.is_existing);
        assert_eq!(again.code, first.code);
    }

    #[test]
    fn resolve_counts_clicks() {
        let svc = service();
        let out = svc.shorten("https://example.com/b").expect("shorten");
        assert_eq!(svc.resolve(&out.code).expect("resolve"), "https://example.com/b");
        svc.resolve(&out.code).expect("resolve");
        assert_eq!(svc.lookup(&out.code).expect("lookup").clicks, 2);
    }

    #[test]
    fn unknown_code_is_not_found() {
        let svc = service();
        assert!(matches!(svc.lookup("nope"), Err(Error::NotFound(_))));
        assert!(matches!(svc.resolve("nope"), Err(Error::NotFound(_))));
        assert!(matches!(svc.lookup(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn entry_serializes_with_camel_case_timestamp() {
        let entry = UrlEntry::new("https://example.com");
        let v = serde_json::to_value(&entry).expect("json");
        assert!(v.get("createdAt").is_some_and(|t| t.is_string()));
        assert_eq!(v["clicks"], 0);

        let parsed: UrlEntry = serde_json::from_str(
            r#"{"url":"https://x.test","createdAt":"2024-05-01T08:30:00.000Z","clicks":3}"#,
        )
        .expect("parse");
        assert_eq!(parsed.clicks, 3);
    }
}
