//! High-fidelity conversion through external engines, with salvage as the last resort.

pub mod cloudconvert;
pub mod libreoffice;

use log::{info, warn};

use crate::docx::package::validate_docx;
use crate::error::{Error, Result};
use crate::salvage::SalvagePipeline;

pub use cloudconvert::CloudConvertProvider;
pub use libreoffice::LibreOfficeProvider;

pub const PAGES_EXTENSION: &str = ".pages";
pub const DOCX_EXTENSION: &str = ".docx";
pub const SALVAGE_PRODUCER: &str = "salvage";

pub const MSG_INVALID_FORMAT: &str = "Invalid file format. Please upload a .pages file";
pub const MSG_NO_FILE: &str = "No file uploaded";

/// An engine that turns Pages bytes into word-processing bytes.
pub trait ConversionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the engine can be used at all (binary installed, credentials present).
    fn is_available(&self) -> bool;

    fn convert(&self, input: &[u8], file_name: &str) -> Result<Vec<u8>>;
}

#[derive(Debug)]
pub struct ConversionOutput {
    pub bytes: Vec<u8>,
    /// Provider name, or `salvage` when the text salvage pipeline wrote the package.
    pub produced_by: String,
    pub file_name: String,
}

impl ConversionOutput {
    pub fn is_salvaged(&self) -> bool {
        self.produced_by == SALVAGE_PRODUCER
    }
}

/// File name without any directory part, for both `/` and `\` separators.
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
}

/// Reject requests that cannot be Pages documents before any work is done.
pub fn check_pages_input(file_name: &str, input: &[u8]) -> Result<()> {
    if !base_name(file_name).ends_with(PAGES_EXTENSION) {
        return Err(Error::InvalidInput(MSG_INVALID_FORMAT.to_string()));
    }
    if input.is_empty() {
        return Err(Error::InvalidInput(MSG_NO_FILE.to_string()));
    }
    Ok(())
}

/// `report.pages` becomes `report.docx`.
pub fn docx_file_name(file_name: &str) -> String {
    let name = base_name(file_name);
    match name.strip_suffix(PAGES_EXTENSION) {
        Some(stem) => format!("{stem}{DOCX_EXTENSION}"),
        None => format!("{name}{DOCX_EXTENSION}"),
    }
}

/// Display title derived from the file name.
pub fn title_from_file_name(file_name: &str) -> String {
    let name = base_name(file_name);
    name.strip_suffix(PAGES_EXTENSION)
        .unwrap_or(name)
        .trim()
        .to_string()
}

pub struct DocumentConverter {
    providers: Vec<Box<dyn ConversionProvider>>,
    pipeline: SalvagePipeline,
}

impl DocumentConverter {
    pub fn new(pipeline: SalvagePipeline) -> Self {
        Self {
            providers: Vec::new(),
            pipeline,
        }
    }

    pub fn with_provider(mut self, provider: Box<dyn ConversionProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn pipeline(&self) -> &SalvagePipeline {
        &self.pipeline
    }

    /// Try every available provider in order, then fall back to salvage.
    ///
    /// A provider result is accepted only when it opens as a word package. Provider
    /// failures never reach the caller; salvage failures do.
    pub fn convert(
        &self,
        input: &[u8],
        file_name: &str,
        title: Option<&str>,
    ) -> Result<ConversionOutput> {
        check_pages_input(file_name, input)?;
        let name = base_name(file_name);
        let out_name = docx_file_name(name);

        for provider in &self.providers {
            if !provider.is_available() {
                info!("provider {} unavailable, skipping", provider.name());
                continue;
            }
            match provider
                .convert(input, name)
                .and_then(|bytes| validate_docx(&bytes).map(|_| bytes))
            {
                Ok(bytes) => {
                    info!("{name} converted by {}", provider.name());
                    return Ok(ConversionOutput {
                        bytes,
                        produced_by: provider.name().to_string(),
                        file_name: out_name,
                    });
                }
                Err(err) => warn!("provider {} failed for {name}: {err}", provider.name()),
            }
        }

        self.salvage(input, name, title)
    }

    /// Salvage only; no external engine is consulted.
    pub fn salvage(
        &self,
        input: &[u8],
        file_name: &str,
        title: Option<&str>,
    ) -> Result<ConversionOutput> {
        check_pages_input(file_name, input)?;
        let title = title
            .map(str::to_string)
            .unwrap_or_else(|| title_from_file_name(file_name));
        let bytes = self.pipeline.convert(input, &title)?;
        Ok(ConversionOutput {
            bytes,
            produced_by: SALVAGE_PRODUCER.to_string(),
            file_name: docx_file_name(file_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;
    use crate::docx::synth::{synthesize_docx, Locale};
    use crate::salvage::ExtractedContent;

    struct FakeProvider {
        name: &'static str,
        available: bool,
        output: Option<Vec<u8>>,
        calls: Arc<AtomicUsize>,
    }

    impl ConversionProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn convert(&self, _input: &[u8], _file_name: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output
                .clone()
                .ok_or_else(|| Error::provider(self.name, "engine crashed"))
        }
    }

    fn fake(
        name: &'static str,
        available: bool,
        output: Option<Vec<u8>>,
    ) -> (Box<FakeProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = Box::new(FakeProvider {
            name,
            available,
            output,
            calls: calls.clone(),
        });
        (p, calls)
    }

    fn pages_zip() -> Vec<u8> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        zout.start_file("index.xml", SimpleFileOptions::default())
            .expect("start");
        zout.write_all(b"<sf:p>Salvaged paragraph</sf:p>").expect("write");
        zout.finish().expect("finish").into_inner()
    }

    fn real_docx() -> Vec<u8> {
        let mut content = ExtractedContent::new("From engine");
        content.paragraphs.push("Engine text".to_string());
        synthesize_docx(&content, Locale::En).expect("synth")
    }

    #[test]
    fn gates_on_pages_extension() {
        let conv = DocumentConverter::new(SalvagePipeline::default());
        let err = conv.convert(b"data", "notes.docx", None).unwrap_err();
        assert_eq!(err.to_string(), MSG_INVALID_FORMAT);
        let err = conv.convert(b"", "notes.pages", None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn names_output_after_input() {
        assert_eq!(docx_file_name("dir/My Report.pages"), "My Report.docx");
        assert_eq!(docx_file_name(r"C:\docs\a.pages"), "a.docx");
        assert_eq!(title_from_file_name("/tmp/My Report.pages"), "My Report");
    }

    #[test]
    fn first_valid_provider_wins() {
        let (down, down_calls) = fake("down", false, Some(real_docx()));
        let (broken, broken_calls) = fake("broken", true, None);
        let (garbage, _) = fake("garbage", true, Some(b"not a zip".to_vec()));
        let (good, good_calls) = fake("good", true, Some(real_docx()));
        let conv = DocumentConverter::new(SalvagePipeline::default())
            .with_provider(down)
            .with_provider(broken)
            .with_provider(garbage)
            .with_provider(good);
        assert_eq!(conv.provider_names(), vec!["down", "broken", "garbage", "good"]);

        let out = conv.convert(&pages_zip(), "a.pages", None).expect("convert");
        assert_eq!(out.produced_by, "good");
        assert_eq!(out.file_name, "a.docx");
        assert!(!out.is_salvaged());
        assert_eq!(down_calls.load(Ordering::SeqCst), 0);
        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
        assert_eq!(good_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn falls_back_to_salvage() {
        let (broken, _) = fake("broken", true, None);
        let conv = DocumentConverter::new(SalvagePipeline::default()).with_provider(broken);
        let out = conv.convert(&pages_zip(), "a.pages", Some("Title")).expect("convert");
        assert!(out.is_salvaged());
        let pkg = validate_docx(&out.bytes).expect("valid");
        let doc = pkg.part_text("word/document.xml").expect("document");
        assert!(doc.contains("<w:t>Salvaged paragraph</w:t>"));
    }

    #[test]
    fn salvage_surfaces_container_errors() {
        let conv = DocumentConverter::new(SalvagePipeline::default());
        let err = conv.convert(b"plain text", "a.pages", None).unwrap_err();
        assert_eq!(err.user_message(), crate::error::MSG_INVALID_CONTAINER);
    }
}
