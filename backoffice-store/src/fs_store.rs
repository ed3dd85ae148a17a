use crate::Store;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::{Pattern, glob};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: Utf8PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn path(&self, key: &str) -> Utf8PathBuf {
        let key = key.trim_matches('/');
        if key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(key)
        }
    }

    fn children(&self, prefix: &str, want_dirs: bool) -> anyhow::Result<Vec<String>> {
        let dir = self.path(prefix);
        let pattern = format!("{}/*", Pattern::escape(dir.as_str()));

        let mut out = Vec::new();
        for entry in glob(&pattern).with_context(|| format!("glob {pattern}"))? {
            let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
            if path.is_dir() != want_dirs {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                debug!(path = %path.display(), "skipping non-utf8 entry");
                continue;
            };
            if !want_dirs && is_temp_file(Utf8Path::new(name)) {
                continue;
            }
            out.push(name.to_string());
        }
        out.sort();
        Ok(out)
    }
}

impl Store for FsStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {path}")),
        }
    }

    fn put(&self, key: &str, contents: &[u8]) -> anyhow::Result<()> {
        let path = self.path(key);
        let Some(parent) = path.parent() else {
            anyhow::bail!("path has no parent: {path}");
        };
        fs::create_dir_all(parent).with_context(|| format!("create dir {parent}"))?;

        let tmp = temp_path_next_to(&path);
        fs::write(&tmp, contents).with_context(|| format!("write temp {tmp}"))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("rename {tmp} -> {path}"));
        }
        debug!(path = %path, bytes = contents.len(), "wrote object");
        Ok(())
    }

    fn list_files(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        self.children(prefix, false)
    }

    fn list_dirs(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        self.children(prefix, true)
    }

    fn list_recursive(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let base = self.path(prefix);
        let mut out = Vec::new();
        if base.is_dir() {
            walk(&base, &base, &mut out)?;
        }
        out.sort();
        Ok(out)
    }

    fn remove_prefix(&self, prefix: &str) -> anyhow::Result<()> {
        let path = self.path(prefix);
        if path.is_dir() {
            fs::remove_dir_all(&path).with_context(|| format!("remove {path}"))?;
        } else if path.exists() {
            fs::remove_file(&path).with_context(|| format!("remove {path}"))?;
        }
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        self.path(key).to_string()
    }
}

fn walk(base: &Utf8Path, dir: &Utf8Path, out: &mut Vec<String>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|p| anyhow::anyhow!("non-utf8 path: {}", p.display()))?;
        if path.is_dir() {
            walk(base, &path, out)?;
        } else if is_temp_file(&path) {
            continue;
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.as_str().replace('\\', "/"));
        }
    }
    Ok(())
}

/// Temp files of in-flight atomic writes.
fn is_temp_file(path: &Utf8Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"))
}

fn temp_path_next_to(path: &Utf8Path) -> Utf8PathBuf {
    let file_name = path.file_name().unwrap_or("object");
    let pid = std::process::id();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{file_name}.{pid}.{n}.tmp"))
}
