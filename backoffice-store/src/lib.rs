//! Storage port for backoffice documents.
//!
//! Keys are `/`-separated relative paths (`reports/<id>/<version>/summary.json`).
//! Every [`Store::put`] is a single atomic replacement: readers observe either
//! the previous document or the new one, never a partial write.
//!
//! Backends:
//! - [`FsStore`] (feature `fs`): a directory tree on local disk.
//! - [`MemoryStore`] (feature `memory`): an in-process map for embedding and tests.

#[cfg(feature = "fs")]
mod fs_store;
#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "fs")]
pub use fs_store::FsStore;
#[cfg(feature = "memory")]
pub use memory::MemoryStore;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Object storage holding index, summaries, reports and collection files.
pub trait Store: std::fmt::Debug + Send + Sync {
    /// Read an object. `Ok(None)` when it does not exist.
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Atomically create or replace an object.
    fn put(&self, key: &str, contents: &[u8]) -> anyhow::Result<()>;

    /// Names of the objects directly under `prefix`, sorted.
    fn list_files(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Names of the "folders" directly under `prefix`, sorted.
    fn list_dirs(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Keys (relative to `prefix`) of every object below `prefix`, sorted.
    fn list_recursive(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Delete every object below `prefix` (or the object named `prefix`).
    fn remove_prefix(&self, prefix: &str) -> anyhow::Result<()>;

    /// Human-readable location of `key` (path or URL).
    fn location(&self, key: &str) -> String;

    fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Copy every object below `from` to the same relative key below `to`.
    fn copy_prefix(&self, from: &str, to: &str) -> anyhow::Result<()> {
        for rel in self.list_recursive(from)? {
            let src = join_key(&[from, &rel]);
            let dst = join_key(&[to, &rel]);
            let data = self
                .get(&src)?
                .with_context(|| format!("object vanished while copying: {src}"))?;
            self.put(&dst, &data)?;
        }
        Ok(())
    }
}

/// Join key segments with `/`, dropping empty segments and stray slashes.
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read and deserialize a JSON document. `Ok(None)` when absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> anyhow::Result<Option<T>> {
    match store.get(key)? {
        None => Ok(None),
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .with_context(|| format!("parse {}", store.location(key)))?;
            Ok(Some(value))
        }
    }
}

/// Serialize `value` as pretty JSON (trailing newline) and write it atomically.
pub fn save_json<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(value).context("serialize json")?;
    json.push('\n');
    store.put(key, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::join_key;

    #[test]
    fn join_key_skips_empty_segments() {
        assert_eq!(join_key(&["", "reports/", "/a", "b.json"]), "reports/a/b.json");
        assert_eq!(join_key(&[]), "");
    }
}
