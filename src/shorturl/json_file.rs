use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{UrlEntry, UrlStore};

pub const DEFAULT_DATA_FILE: &str = "data/urls.json";

/// On-disk layout: `{"urls": {"<code>": {"url", "createdAt", "clicks"}}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UrlDatabase {
    #[serde(default)]
    urls: BTreeMap<String, UrlEntry>,
}

/// Durable store backed by one JSON file, re-read on every call.
///
/// A missing or unreadable file reads as empty. Writes go to a temporary file in the same
/// directory which then replaces the target, so readers never see a partial document.
pub struct JsonFileUrlStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileUrlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_db(&self) -> UrlDatabase {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return UrlDatabase::default(),
            Err(e) => {
                warn!("read {}: {e}; treating store as empty", self.path.display());
                return UrlDatabase::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("parse {}: {e}; treating store as empty", self.path.display());
            UrlDatabase::default()
        })
    }

    fn write_db(&self, db: &UrlDatabase) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, db)
            .map_err(|e| Error::Store(format!("serialize {}: {e}", self.path.display())))?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce(&mut UrlDatabase) -> Option<T>) -> Result<Option<T>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut db = self.read_db();
        let out = f(&mut db);
        if out.is_some() {
            self.write_db(&db)?;
        }
        Ok(out)
    }
}

impl UrlStore for JsonFileUrlStore {
    fn get(&self, code: &str) -> Result<Option<UrlEntry>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_db().urls.remove(code))
    }

    fn set(&self, code: &str, entry: UrlEntry) -> Result<()> {
        self.update(|db| {
            db.urls.insert(code.to_string(), entry);
            Some(())
        })?;
        Ok(())
    }

    fn find_by_url(&self, url: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .read_db()
            .urls
            .into_iter()
            .find(|(_, e)| e.url == url)
            .map(|(code, _)| code))
    }

    fn increment_clicks(&self, code: &str) -> Result<bool> {
        let hit = self.update(|db| {
            let entry = db.urls.get_mut(code)?;
            entry.clicks += 1;
            Some(())
        })?;
        Ok(hit.is_some())
    }
}
