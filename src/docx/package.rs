use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::xml::parse_xml_part;
use crate::error::{Error, Result};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub const DOCUMENT_PART: &str = "word/document.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const STYLES_PART: &str = "word/styles.xml";

/// Largest single part read back from a package.
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

/// Parts any word-processing package must carry to open.
pub const REQUIRED_PARTS: [&str; 3] = [CONTENT_TYPES_PART, PACKAGE_RELS_PART, DOCUMENT_PART];

/// In-memory Office Open XML package.
#[derive(Default)]
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_limit(bytes, MAX_PART_BYTES)
    }

    /// Like [`DocxPackage::from_bytes`], rejecting any part larger than `max_part_bytes`.
    /// Declared sizes are untrusted, so reads stop at the limit.
    pub fn from_bytes_with_limit(bytes: &[u8], max_part_bytes: u64) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::ContainerFormat(e.to_string()))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let declared = file.size();
            if declared > max_part_bytes {
                return Err(Error::ContainerFormat(format!(
                    "part {} declares {declared} bytes, limit {max_part_bytes}",
                    file.name()
                )));
            }
            let mut data = Vec::with_capacity(declared as usize);
            (&mut file)
                .take(max_part_bytes + 1)
                .read_to_end(&mut data)?;
            if data.len() as u64 > max_part_bytes {
                return Err(Error::ContainerFormat(format!(
                    "part {} exceeds {max_part_bytes} bytes",
                    file.name()
                )));
            }
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn push_part(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.entries.push(DocxEntry {
            name: name.to_string(),
            data: data.into(),
            is_dir: false,
        });
    }

    pub fn entry(&self, name: &str) -> Option<&DocxEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn part_text(&self, name: &str) -> Option<String> {
        self.entry(name)
            .map(|e| String::from_utf8_lossy(&e.data).into_owned())
    }

    pub fn xml_entries(&self) -> Vec<&DocxEntry> {
        self.entries
            .iter()
            .filter(|e| {
                let lower = e.name.to_lowercase();
                lower.ends_with(".xml") || lower.ends_with(".rels")
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for ent in &self.entries {
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)
                    .map_err(|e| Error::Synthesis(format!("add zip dir {}: {e}", ent.name)))?;
            } else {
                zout.start_file(ent.name.as_str(), opts)
                    .map_err(|e| Error::Synthesis(format!("start zip file {}: {e}", ent.name)))?;
                zout.write_all(&ent.data)
                    .map_err(|e| Error::Synthesis(format!("write zip file {}: {e}", ent.name)))?;
            }
        }
        let cursor = zout
            .finish()
            .map_err(|e| Error::Synthesis(format!("finish zip: {e}")))?;
        Ok(cursor.into_inner())
    }
}

/// Open `bytes` as a word package and check the parts Word needs are present and parse.
pub fn validate_docx(bytes: &[u8]) -> Result<DocxPackage> {
    let pkg = DocxPackage::from_bytes(bytes)?;
    for part in REQUIRED_PARTS {
        if pkg.entry(part).is_none() {
            return Err(Error::ContainerFormat(format!("missing part: {part}")));
        }
    }
    for part in [CONTENT_TYPES_PART, DOCUMENT_PART] {
        if let Some(ent) = pkg.entry(part) {
            parse_xml_part(&ent.name, &ent.data)?;
        }
    }
    Ok(pkg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_parts() {
        let mut pkg = DocxPackage::new();
        pkg.push_part("a/b.xml", "<a/>");
        pkg.entries.push(DocxEntry {
            name: "media/".to_string(),
            data: Vec::new(),
            is_dir: true,
        });
        let bytes = pkg.to_bytes().expect("write");
        let back = DocxPackage::from_bytes(&bytes).expect("read");
        assert_eq!(back.part_text("a/b.xml").as_deref(), Some("<a/>"));
        assert!(back.entry("media/").is_some_and(|e| e.is_dir));
        assert_eq!(back.xml_entries().len(), 1);
    }

    #[test]
    fn validation_requires_core_parts() {
        let mut pkg = DocxPackage::new();
        pkg.push_part(CONTENT_TYPES_PART, "<Types/>");
        pkg.push_part(PACKAGE_RELS_PART, "<Relationships/>");
        let bytes = pkg.to_bytes().expect("write");
        let err = validate_docx(&bytes).err().expect("missing document");
        assert!(err.to_string().contains(DOCUMENT_PART));
    }

    #[test]
    fn validation_rejects_malformed_document() {
        let mut pkg = DocxPackage::new();
        pkg.push_part(CONTENT_TYPES_PART, "<Types/>");
        pkg.push_part(PACKAGE_RELS_PART, "<Relationships/>");
        pkg.push_part(DOCUMENT_PART, "<w:document><w:body></w:document>");
        let bytes = pkg.to_bytes().expect("write");
        assert!(validate_docx(&bytes).is_err());
    }

    #[test]
    fn oversized_parts_are_rejected() {
        let mut pkg = DocxPackage::new();
        pkg.push_part("small.xml", "<a/>");
        pkg.push_part(DOCUMENT_PART, vec![b'x'; 64]);
        let bytes = pkg.to_bytes().expect("write");

        assert!(DocxPackage::from_bytes_with_limit(&bytes, 64).is_ok());
        let err = DocxPackage::from_bytes_with_limit(&bytes, 63)
            .err()
            .expect("too large");
        assert!(matches!(err, Error::ContainerFormat(_)));
        assert!(err.to_string().contains(DOCUMENT_PART));
    }

    #[test]
    fn rejects_non_zip() {
        assert!(matches!(
            DocxPackage::from_bytes(b"nope"),
            Err(Error::ContainerFormat(_))
        ));
    }
}
