use std::io::{Cursor, Read, Seek};

use log::{debug, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};

use super::SalvageLimits;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "tif", "tiff", "bmp", "heic", "webp",
];

/// Nested archive shipped by some Pages revisions.
pub const NESTED_ARCHIVE_NAME: &str = "index.zip";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Xml,
    Iwa,
    Image,
    NestedArchive,
    Other,
}

impl EntryKind {
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        let file_name = lower.rsplit('/').next().unwrap_or(&lower);
        if file_name == NESTED_ARCHIVE_NAME {
            return Self::NestedArchive;
        }
        let ext = match file_name.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => return Self::Other,
        };
        match ext {
            "xml" => Self::Xml,
            "iwa" => Self::Iwa,
            e if IMAGE_EXTENSIONS.contains(&e) => Self::Image,
            _ => Self::Other,
        }
    }

    pub fn is_text_bearing(self) -> bool {
        matches!(self, Self::Xml | Self::Iwa)
    }
}

/// One member of the opened container.
///
/// `Other` members are listed but their payload is not read.
pub struct RawEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
    pub kind: EntryKind,
    pub declared_size: u64,
    pub truncated: bool,
}

#[derive(Default)]
pub struct Container {
    pub entries: Vec<RawEntry>,
    pub skipped: usize,
    bytes_read: u64,
}

impl Container {
    /// Open a zip container, flattening a nested `Index.zip` into the same entry list.
    ///
    /// Only a failure to open the outer archive is fatal; a bad member is logged and skipped.
    pub fn read(bytes: &[u8], limits: &SalvageLimits) -> Result<Self> {
        let size = bytes.len() as u64;
        if size > limits.max_input_bytes {
            return Err(Error::InputTooLarge {
                size,
                limit: limits.max_input_bytes,
            });
        }
        let mut container = Container::default();
        container.read_archive(bytes, "", 0, limits)?;
        debug!(
            "container: {} entries ({} xml, {} iwa, {} images), {} skipped",
            container.entries.len(),
            container.entries_of(EntryKind::Xml).count(),
            container.entries_of(EntryKind::Iwa).count(),
            container.entries_of(EntryKind::Image).count(),
            container.skipped
        );
        Ok(container)
    }

    pub fn entries_of(&self, kind: EntryKind) -> impl Iterator<Item = &RawEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn entry(&self, name: &str) -> Option<&RawEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn read_archive(
        &mut self,
        bytes: &[u8],
        prefix: &str,
        depth: usize,
        limits: &SalvageLimits,
    ) -> Result<()> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::ContainerFormat(e.to_string()))?;

        for index in 0..zip.len() {
            if self.entries.len() >= limits.max_entries {
                warn!(
                    "entry limit {} reached, ignoring the rest of {}",
                    limits.max_entries,
                    if prefix.is_empty() { "the archive" } else { prefix }
                );
                break;
            }
            let entry = match self.read_entry(&mut zip, index, prefix, limits) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    warn!("skipping entry: {err}");
                    self.skipped += 1;
                    continue;
                }
            };

            if entry.kind != EntryKind::NestedArchive {
                self.entries.push(entry);
                continue;
            }
            if depth >= limits.max_nested_depth {
                warn!("skipping nested archive {}: depth limit reached", entry.name);
                self.skipped += 1;
                continue;
            }
            let nested_prefix = format!("{}/", entry.name);
            if let Err(err) = self.read_archive(&entry.data, &nested_prefix, depth + 1, limits) {
                warn!("skipping nested archive {}: {err}", entry.name);
                self.skipped += 1;
            }
        }
        Ok(())
    }

    fn read_entry<R: Read + Seek>(
        &mut self,
        zip: &mut ZipArchive<R>,
        index: usize,
        prefix: &str,
        limits: &SalvageLimits,
    ) -> Result<Option<RawEntry>> {
        let mut file = zip.by_index(index).map_err(|e| Error::EntryDecode {
            name: format!("{prefix}#{index}"),
            reason: e.to_string(),
        })?;
        if file.is_dir() {
            return Ok(None);
        }
        let name = format!("{prefix}{}", file.name());
        let kind = EntryKind::classify(&name);
        let declared_size = file.size();

        let cap = match kind {
            EntryKind::Xml | EntryKind::Iwa => limits.max_entry_scan_bytes,
            EntryKind::Image | EntryKind::NestedArchive => {
                if declared_size > limits.max_input_bytes {
                    return Err(Error::EntryDecode {
                        name,
                        reason: format!(
                            "declared size {declared_size} exceeds limit {}",
                            limits.max_input_bytes
                        ),
                    });
                }
                limits.max_input_bytes
            }
            EntryKind::Other => {
                return Ok(Some(RawEntry {
                    name,
                    data: Vec::new(),
                    is_dir: false,
                    kind,
                    declared_size,
                    truncated: false,
                }));
            }
        };
        let remaining = limits.max_total_bytes.saturating_sub(self.bytes_read);
        if remaining == 0 {
            return Err(Error::EntryDecode {
                name,
                reason: "total decompressed size limit reached".to_string(),
            });
        }
        let cap = cap.min(remaining);

        let mut data = Vec::with_capacity(declared_size.min(cap) as usize);
        (&mut file)
            .take(cap)
            .read_to_end(&mut data)
            .map_err(|e| Error::EntryDecode {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        self.bytes_read += data.len() as u64;

        let truncated = declared_size > data.len() as u64;
        if truncated && !kind.is_text_bearing() {
            return Err(Error::EntryDecode {
                name,
                reason: "payload truncated by size limit".to_string(),
            });
        }
        if truncated {
            debug!("{name}: scanning first {} of {declared_size} bytes", data.len());
        }

        Ok(Some(RawEntry {
            name,
            data,
            is_dir: false,
            kind,
            declared_size,
            truncated,
        }))
    }
}
