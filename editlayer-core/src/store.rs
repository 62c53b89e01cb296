//! The real document store the overlay commits to.
//!
//! Paths are store-relative and `/`-separated.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

pub trait DocumentStore {
    fn read(&self, path: &str) -> Result<Option<String>>;
    fn exists(&self, path: &str) -> Result<bool>;
    /// Fails if the file already exists.
    fn create(&mut self, path: &str, content: &str) -> Result<()>;
    fn overwrite(&mut self, path: &str, content: &str) -> Result<()>;
    fn delete(&mut self, path: &str) -> Result<()>;
    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()>;
    fn ensure_container(&mut self, dir: &str) -> Result<()>;
}

pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    unified
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// The container holding `path`, or `None` for top-level entries.
pub fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

/// A store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(normalize_path(path));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentStore for FsStore {
    fn read(&self, path: &str) -> Result<Option<String>> {
        let full_path = self.resolve(path)?;
        match fs::read(&full_path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| Error::Encoding(path.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_file())
    }

    fn create(&mut self, path: &str, content: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    fn overwrite(&mut self, path: &str, content: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        fs::write(&full_path, content)?;
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        fs::remove_file(&full_path)?;
        Ok(())
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        let from = self.resolve(old_path)?;
        let to = self.resolve(new_path)?;
        fs::rename(&from, &to)?;
        Ok(())
    }

    fn ensure_container(&mut self, dir: &str) -> Result<()> {
        let full_path = self.resolve(dir)?;
        fs::create_dir_all(&full_path)?;
        Ok(())
    }
}

/// An in-memory store. Containers are tracked but never required.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, String>,
    containers: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(normalize_path(path), content.to_string());
        self
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn has_container(&self, dir: &str) -> bool {
        self.containers.contains(&normalize_path(dir))
    }

    fn missing(path: &str) -> Error {
        std::io::Error::new(ErrorKind::NotFound, format!("{path} does not exist")).into()
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Option<String>> {
        Ok(self.files.get(&normalize_path(path)).cloned())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.contains_key(&normalize_path(path)))
    }

    fn create(&mut self, path: &str, content: &str) -> Result<()> {
        let key = normalize_path(path);
        if self.files.contains_key(&key) {
            return Err(
                std::io::Error::new(ErrorKind::AlreadyExists, format!("{key} already exists"))
                    .into(),
            );
        }
        self.files.insert(key, content.to_string());
        Ok(())
    }

    fn overwrite(&mut self, path: &str, content: &str) -> Result<()> {
        self.files.insert(normalize_path(path), content.to_string());
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.files
            .remove(&normalize_path(path))
            .map(|_| ())
            .ok_or_else(|| Self::missing(path))
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        let content = self
            .files
            .remove(&normalize_path(old_path))
            .ok_or_else(|| Self::missing(old_path))?;
        self.files.insert(normalize_path(new_path), content);
        Ok(())
    }

    fn ensure_container(&mut self, dir: &str) -> Result<()> {
        self.containers.insert(normalize_path(dir));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./notes/a.md"), "notes/a.md");
        assert_eq!(normalize_path("/notes//a.md"), "notes/a.md");
        assert_eq!(normalize_path("notes\\sub\\a.md"), "notes/sub/a.md");
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("notes/sub/a.md"), Some("notes/sub"));
        assert_eq!(parent_of("a.md"), None);
    }

    #[test]
    fn test_fs_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FsStore::new(temp_dir.path());

        assert_eq!(store.read("a.md").unwrap(), None);

        store.ensure_container("dir/sub").unwrap();
        store.create("dir/sub/a.md", "hello").unwrap();
        assert!(store.exists("dir/sub/a.md").unwrap());
        assert!(store.create("dir/sub/a.md", "again").is_err());

        store.overwrite("dir/sub/a.md", "changed").unwrap();
        store.rename("dir/sub/a.md", "dir/b.md").unwrap();
        assert_eq!(store.read("dir/b.md").unwrap().as_deref(), Some("changed"));
        assert!(!store.exists("dir/sub/a.md").unwrap());

        store.delete("dir/b.md").unwrap();
        assert_eq!(store.read("dir/b.md").unwrap(), None);
    }

    #[test]
    fn test_fs_store_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        assert!(matches!(
            store.read("../outside.md"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(store.read(""), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_fs_store_rejects_binary_content() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();
        let store = FsStore::new(temp_dir.path());

        assert!(matches!(store.read("blob.bin"), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new().with_file("a.md", "A");

        assert!(store.create("a.md", "again").is_err());
        store.rename("a.md", "b.md").unwrap();
        assert_eq!(store.read("b.md").unwrap().as_deref(), Some("A"));
        assert!(store.delete("a.md").is_err());

        store.ensure_container("notes").unwrap();
        assert!(store.has_container("notes"));
    }
}
