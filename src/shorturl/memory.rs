use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

use super::{UrlEntry, UrlStore};

#[derive(Default)]
struct State {
    by_code: HashMap<String, UrlEntry>,
    by_url: HashMap<String, String>,
}

/// Process-local store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryUrlStore {
    state: Mutex<State>,
}

impl MemoryUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl UrlStore for MemoryUrlStore {
    fn get(&self, code: &str) -> Result<Option<UrlEntry>> {
        Ok(self.lock().by_code.get(code).cloned())
    }

    fn set(&self, code: &str, entry: UrlEntry) -> Result<()> {
        let mut state = self.lock();
        if let Some(old) = state.by_code.get(code) {
            let old_url = old.url.clone();
            state.by_url.remove(&old_url);
        }
        state.by_url.insert(entry.url.clone(), code.to_string());
        state.by_code.insert(code.to_string(), entry);
        Ok(())
    }

    fn find_by_url(&self, url: &str) -> Result<Option<String>> {
        Ok(self.lock().by_url.get(url).cloned())
    }

    fn increment_clicks(&self, code: &str) -> Result<bool> {
        match self.lock().by_code.get_mut(code) {
            Some(entry) => {
                entry.clicks += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwriting_a_code_moves_the_reverse_index() {
        let store = MemoryUrlStore::new();
        store.set("abc", UrlEntry::new("https://one.test")).expect("set");
        store.set("abc", UrlEntry::new("https://two.test")).expect("set");
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_url("https://one.test").expect("find"), None);
        assert_eq!(
            store.find_by_url("https://two.test").expect("find").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn increment_reports_unknown_codes() {
        let store = MemoryUrlStore::new();
        assert!(!store.increment_clicks("zzz").expect("inc"));
        store.set("zzz", UrlEntry::new("https://z.test")).expect("set");
        assert!(store.increment_clicks("zzz").expect("inc"));
        assert_eq!(store.get("zzz").expect("get").map(|e| e.clicks), Some(1));
    }
}
