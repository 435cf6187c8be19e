//! Noise predicates applied to candidate fragments.
//!
//! Each predicate is named so the reason a fragment was dropped can be logged and tested
//! on its own. A fragment is kept only when no predicate in the list rejects it. Lists are
//! evaluated in order and the first rejection wins.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::textutil::char_len;

#[derive(Clone, Copy)]
pub struct FragmentFilter {
    pub name: &'static str,
    pub rejects: fn(&str) -> bool,
}

/// Substrings that mark URLs, vendor domains and schema namespaces.
pub const NAMESPACE_MARKERS: &[&str] = &[
    "http://",
    "https://",
    "apple.com",
    "w3.org",
    "purl.org",
    "openxmlformats.org",
    "schemas.microsoft.com",
];

/// Names of the serialization format and its vendor; runs mentioning them are metadata.
pub const FORMAT_NAME_MARKERS: &[&str] = &["iwork", "apple", "protobuf"];

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .expect("uuid regex")
});
static UPPER_SNAKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+$").expect("upper snake regex"));
static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+(?:[.,][0-9]+)*$").expect("numeric regex"));
static BASE64_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/=]{50,}$").expect("base64 regex"));
// Chunk type tags of the binary format (TSWP, TSCE, TSDG, ...).
static FORMAT_MAGIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^TS[A-Z]{2}").expect("format magic regex"));
static UPPER_IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]{2,}$").expect("upper ident regex"));
static HEX_DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Fa-f-]{30,}$").expect("hex dash regex"));

pub fn single_char(text: &str) -> bool {
    char_len(text) <= 1
}

pub fn xmlns_declaration(text: &str) -> bool {
    text.starts_with("xmlns")
}

pub fn url_or_namespace(text: &str) -> bool {
    NAMESPACE_MARKERS.iter().any(|m| text.contains(m))
}

pub fn uuid(text: &str) -> bool {
    UUID_RE.is_match(text)
}

pub fn upper_snake_identifier(text: &str) -> bool {
    UPPER_SNAKE_RE.is_match(text)
}

pub fn numeric(text: &str) -> bool {
    NUMERIC_RE.is_match(text)
}

pub fn base64_blob(text: &str) -> bool {
    BASE64_RE.is_match(text)
}

pub fn too_short_run(text: &str) -> bool {
    char_len(text) <= 2
}

pub fn format_magic(text: &str) -> bool {
    FORMAT_MAGIC_RE.is_match(text)
}

pub fn format_or_vendor_name(text: &str) -> bool {
    let lower = text.to_lowercase();
    FORMAT_NAME_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn upper_identifier(text: &str) -> bool {
    UPPER_IDENT_RE.is_match(text)
}

pub fn hex_dash_id(text: &str) -> bool {
    HEX_DASH_RE.is_match(text)
}

pub fn all_control(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_control)
}

/// Applied to text found between XML tags, after entity decoding and trimming.
pub const XML_FILTERS: &[FragmentFilter] = &[
    FragmentFilter { name: "single_char", rejects: single_char },
    FragmentFilter { name: "xmlns_declaration", rejects: xmlns_declaration },
    FragmentFilter { name: "url_or_namespace", rejects: url_or_namespace },
    FragmentFilter { name: "uuid", rejects: uuid },
    FragmentFilter { name: "upper_snake_identifier", rejects: upper_snake_identifier },
    FragmentFilter { name: "numeric", rejects: numeric },
    FragmentFilter { name: "base64_blob", rejects: base64_blob },
];

/// Applied to trimmed readable runs found in binary entries.
pub const BINARY_FILTERS: &[FragmentFilter] = &[
    FragmentFilter { name: "too_short_run", rejects: too_short_run },
    FragmentFilter { name: "format_magic", rejects: format_magic },
    FragmentFilter { name: "format_or_vendor_name", rejects: format_or_vendor_name },
    FragmentFilter { name: "upper_identifier", rejects: upper_identifier },
    FragmentFilter { name: "hex_dash_id", rejects: hex_dash_id },
    FragmentFilter { name: "all_control", rejects: all_control },
];

/// Name of the first predicate rejecting `text`, if any.
pub fn first_rejection(filters: &[FragmentFilter], text: &str) -> Option<&'static str> {
    filters.iter().find(|f| (f.rejects)(text)).map(|f| f.name)
}

pub fn passes(filters: &[FragmentFilter], text: &str) -> bool {
    first_rejection(filters, text).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_predicates() {
        assert!(single_char("a"));
        assert!(!single_char("ab"));
        assert!(xmlns_declaration("xmlns:sf"));
        assert!(url_or_namespace("http://example.com"));
        assert!(url_or_namespace("see developer.apple.com"));
        assert!(!url_or_namespace("plain prose"));
        assert!(uuid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!uuid("123e4567-e89b-12d3-a456"));
        assert!(upper_snake_identifier("SF_TEXT_STORAGE"));
        assert!(!upper_snake_identifier("NASA"));
        assert!(!upper_snake_identifier("Snake_Case"));
        assert!(numeric("12345"));
        assert!(numeric("3.14"));
        assert!(!numeric("3 apples"));
        assert!(base64_blob(&"QUJD".repeat(13)));
        assert!(!base64_blob("QUJD"));
    }

    #[test]
    fn binary_predicates() {
        assert!(too_short_run("ab"));
        assert!(!too_short_run("abc"));
        assert!(format_magic("TSWPArchive"));
        assert!(!format_magic("TSw"));
        assert!(format_or_vendor_name("Created with iWork"));
        assert!(format_or_vendor_name("APPLE Inc"));
        assert!(upper_identifier("ABC"));
        assert!(upper_identifier("TEXT_BODY"));
        assert!(!upper_identifier("AB"));
        assert!(!upper_identifier("Hello"));
        assert!(hex_dash_id("0F3E2B1A-9C8D-4E7F-A6B5-C4D3E2F1A0B9"));
        assert!(!hex_dash_id("deadbeef"));
        assert!(all_control("\u{1}\u{2}"));
        assert!(!all_control("a\u{1}"));
        assert!(!all_control(""));
    }

    #[test]
    fn first_rejection_reports_in_order() {
        assert_eq!(first_rejection(XML_FILTERS, "x"), Some("single_char"));
        assert_eq!(
            first_rejection(XML_FILTERS, "xmlns=http://www.w3.org"),
            Some("xmlns_declaration")
        );
        assert_eq!(first_rejection(XML_FILTERS, "Hello"), None);
        assert_eq!(first_rejection(BINARY_FILTERS, "TSCEArchive"), Some("format_magic"));
        assert!(passes(BINARY_FILTERS, "正文内容"));
    }
}
