//! Best-effort text salvage for Pages documents.
//!
//! Used when no external conversion engine is available. The stages run strictly in order,
//! each consuming the complete output of the previous one:
//!
//! ```text
//! bytes → Container (zip + nested Index.zip) → fragments (xml / binary scan)
//!       → normalized paragraphs → minimal .docx
//! ```
//!
//! Everything is rebuilt per call; nothing is shared between requests.

pub mod binary_text;
pub mod container;
pub mod content;
pub mod filters;
pub mod normalize;
pub mod xml_text;

use log::{debug, info};

use crate::docx::synth::{synthesize_docx, Locale};
use crate::error::Result;

pub use container::{Container, EntryKind, RawEntry};
pub use content::{ExtractedContent, ExtractedFragment, ImageBlob};
pub use normalize::{normalize_fragments, NormalizeOptions};

use binary_text::extract_binary_fragments;
use xml_text::{decode_xml_bytes, extract_xml_fragments};

pub const DEFAULT_MAX_INPUT_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_ENTRY_SCAN_BYTES: u64 = 8 * 1024 * 1024;
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_MAX_NESTED_DEPTH: usize = 2;

/// Work bounds for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SalvageLimits {
    /// Largest accepted input, and largest nested archive or image member.
    pub max_input_bytes: u64,
    /// Text-bearing members are truncated to this many bytes before scanning.
    pub max_entry_scan_bytes: u64,
    /// Budget for all decompressed payloads of one container.
    pub max_total_bytes: u64,
    pub max_entries: usize,
    pub max_nested_depth: usize,
}

impl Default for SalvageLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_entry_scan_bytes: DEFAULT_MAX_ENTRY_SCAN_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_nested_depth: DEFAULT_MAX_NESTED_DEPTH,
        }
    }
}

/// How fragments are pulled out of a single archive member.
pub trait TextSalvageStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Fragments of one member in scan order. Members without text yield nothing.
    fn extract_entry(&self, entry: &RawEntry) -> Vec<ExtractedFragment>;
}

/// XML members get the tag-text scan; `.iwa` members get the Unicode allow-list scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeSalvage;

impl TextSalvageStrategy for UnicodeSalvage {
    fn name(&self) -> &str {
        "unicode"
    }

    fn extract_entry(&self, entry: &RawEntry) -> Vec<ExtractedFragment> {
        let texts = match entry.kind {
            EntryKind::Xml => extract_xml_fragments(&decode_xml_bytes(&entry.data)),
            EntryKind::Iwa => extract_binary_fragments(&entry.data),
            _ => Vec::new(),
        };
        debug!("{}: {} fragments", entry.name, texts.len());
        texts
            .into_iter()
            .map(|text| ExtractedFragment::new(&entry.name, text))
            .collect()
    }
}

pub struct SalvagePipeline {
    strategy: Box<dyn TextSalvageStrategy>,
    limits: SalvageLimits,
    normalize: NormalizeOptions,
    locale: Locale,
}

impl Default for SalvagePipeline {
    fn default() -> Self {
        Self::new(SalvageLimits::default(), NormalizeOptions::default(), Locale::default())
    }
}

impl SalvagePipeline {
    pub fn new(limits: SalvageLimits, normalize: NormalizeOptions, locale: Locale) -> Self {
        Self::with_strategy(Box::new(UnicodeSalvage), limits, normalize, locale)
    }

    pub fn with_strategy(
        strategy: Box<dyn TextSalvageStrategy>,
        limits: SalvageLimits,
        normalize: NormalizeOptions,
        locale: Locale,
    ) -> Self {
        Self {
            strategy,
            limits,
            normalize,
            locale,
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Reader, extractors and normalizer. Fails only when the input is not a usable archive.
    pub fn extract(&self, bytes: &[u8], title: &str) -> Result<ExtractedContent> {
        let container = Container::read(bytes, &self.limits)?;
        let mut content = ExtractedContent::new(title);
        let mut fragments: Vec<String> = Vec::new();

        for entry in container.entries {
            match entry.kind {
                EntryKind::Xml | EntryKind::Iwa => fragments.extend(
                    self.strategy
                        .extract_entry(&entry)
                        .into_iter()
                        .map(|f| f.text),
                ),
                EntryKind::Image => content.images.push(ImageBlob::new(&entry.name, entry.data)),
                EntryKind::NestedArchive | EntryKind::Other => {}
            }
        }

        content.paragraphs = normalize_fragments(&fragments, &self.normalize);
        Ok(content)
    }

    /// Full salvage: extract, then write a minimal word-processing package.
    pub fn convert(&self, bytes: &[u8], title: &str) -> Result<Vec<u8>> {
        let content = self.extract(bytes, title)?;
        if content.is_empty() {
            info!("no text salvaged from {title:?}, writing placeholder body");
        } else {
            info!(
                "salvaged {} paragraphs and {} images from {title:?}",
                content.paragraphs.len(),
                content.images.len()
            );
        }
        synthesize_docx(&content, self.locale)
    }
}
