use serde::Serialize;

/// A candidate piece of salvaged text and the archive member it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedFragment {
    pub source: String,
    pub text: String,
}

impl ExtractedFragment {
    pub fn new(source: &str, text: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            text: text.into(),
        }
    }
}

/// An image member collected from the container. Not placed in the output document.
#[derive(Clone, Debug, Serialize)]
pub struct ImageBlob {
    pub name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub size: usize,
}

impl ImageBlob {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            name: name.to_string(),
            data,
            size,
        }
    }

    /// File name without the archive directories.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Result of the extraction stages: unique, non-blank paragraphs in scan order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExtractedContent {
    pub title: String,
    pub paragraphs: Vec<String>,
    pub images: Vec<ImageBlob>,
}

impl ExtractedContent {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// No text survived normalization; the synthesizer emits the placeholder body.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}
