use crate::Store;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory store for embedding and testing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A poisoned map still holds complete objects; writes are whole-value inserts.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize(key: &str) -> String {
    key.trim_matches('/').to_string()
}

fn dir_prefix(prefix: &str) -> String {
    let p = normalize(prefix);
    if p.is_empty() { p } else { format!("{p}/") }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.lock().get(&normalize(key)).cloned())
    }

    fn put(&self, key: &str, contents: &[u8]) -> anyhow::Result<()> {
        self.lock().insert(normalize(key), contents.to_vec());
        Ok(())
    }

    fn list_files(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let prefix = dir_prefix(prefix);
        Ok(self
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn list_dirs(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let prefix = dir_prefix(prefix);
        let mut dirs: Vec<String> = self
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split_once('/').map(|(dir, _)| dir.to_string()))
            .collect();
        dirs.dedup();
        Ok(dirs)
    }

    fn list_recursive(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let prefix = dir_prefix(prefix);
        Ok(self
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }

    fn remove_prefix(&self, prefix: &str) -> anyhow::Result<()> {
        let exact = normalize(prefix);
        let below = dir_prefix(prefix);
        self.lock()
            .retain(|k, _| *k != exact && !(below.is_empty() || k.starts_with(&below)));
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}", normalize(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_direct_children_only() {
        let store = MemoryStore::new();
        store.put("r/a/summary.json", b"{}").unwrap();
        store.put("r/a/reports/x_1.json", b"{}").unwrap();
        store.put("r/b/summary.json", b"{}").unwrap();

        assert_eq!(store.list_dirs("r").unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_files("r/a").unwrap(), vec!["summary.json"]);
        assert_eq!(
            store.list_recursive("r/a").unwrap(),
            vec!["reports/x_1.json", "summary.json"]
        );
    }

    #[test]
    fn remove_prefix_keeps_siblings_with_shared_name_prefix() {
        let store = MemoryStore::new();
        store.put("r/a/x.json", b"1").unwrap();
        store.put("r/ab/x.json", b"2").unwrap();

        store.remove_prefix("r/a").unwrap();
        assert_eq!(store.keys(), vec!["r/ab/x.json"]);
    }

    #[test]
    fn remove_empty_prefix_clears_the_store() {
        let store = MemoryStore::new();
        store.put("a.json", b"1").unwrap();
        store.put("r/b.json", b"2").unwrap();

        store.remove_prefix("").unwrap();
        assert!(store.keys().is_empty());
    }
}
