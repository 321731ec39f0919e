use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::key::namespace_dir;

#[derive(Error, Debug)]
#[error("Cache I/O error on {}: {source}", path.display())]
pub struct StoreError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl StoreError {
    fn new(path: &Path, source: std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// An opened cache file, ready to be streamed.
#[derive(Debug)]
pub struct StoredFile {
    pub file: File,
    pub len: u64,
    /// Quoted md5 of the file contents.
    pub etag: String,
}

/// Filesystem cache laid out as `<root>/<namespace dir>/<file name>`, where the namespace
/// dir is the key split into bounded segments plus a terminator (see [`namespace_dir`]).
///
/// No internal synchronization: callers hold the namespace lock around writes and deletes.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace_dir(namespace))
    }

    pub fn entry_path(&self, namespace: &str, file_name: &str) -> PathBuf {
        self.namespace_path(namespace).join(file_name)
    }

    pub async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        fs::try_exists(path)
            .await
            .map_err(|e| StoreError::new(path, e))
    }

    /// Open a cache file for reading, positioned at the start. Fails with `NotFound` if it
    /// has not been written.
    pub async fn open(&self, path: &Path) -> Result<StoredFile, StoreError> {
        let mut file = File::open(path).await.map_err(|e| StoreError::new(path, e))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .await
            .map_err(|e| StoreError::new(path, e))?;
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| StoreError::new(path, e))?;

        Ok(StoredFile {
            file,
            len: data.len() as u64,
            etag: format!("\"{:x}\"", md5::compute(&data)),
        })
    }

    /// Write `data` to `path`, creating parent directories as needed.
    ///
    /// Data lands in a temporary sibling first and is renamed into place, so readers
    /// only ever see complete files.
    pub async fn write(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::new(parent, e))?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).await.map_err(|e| StoreError::new(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::new(path, e));
        }

        Ok(())
    }

    /// Remove a namespace and everything in it. Removing an absent namespace succeeds.
    ///
    /// Only the terminated directory goes; leading segment directories may be shared with
    /// longer keys and are left in place.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<bool, StoreError> {
        let path = self.namespace_path(namespace);
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::new(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn read_all(mut stored: StoredFile) -> Vec<u8> {
        let mut data = Vec::new();
        stored.file.read_to_end(&mut data).await.unwrap();
        data
    }

    #[tokio::test]
    async fn write_creates_namespace_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.entry_path("bnM", "small(FillSquare).jpg");

        assert!(!store.exists(&path).await.unwrap());
        store.write(&path, b"thumbnail").await.unwrap();
        assert!(store.exists(&path).await.unwrap());

        let stored = store.open(&path).await.unwrap();
        assert_eq!(stored.len, 9);
        assert_eq!(read_all(stored).await, b"thumbnail");

        // No temporary file left behind
        let names: Vec<_> = std::fs::read_dir(dir.path().join("bnM").join("@"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("small(FillSquare).jpg")]);
    }

    #[tokio::test]
    async fn open_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let err = store.open(&store.entry_path("x", "y.png")).await.unwrap_err();
        assert_eq!(err.source.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_namespace_removes_all_entries_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let first = store.entry_path("ns", "originalImage.jpg");
        let second = store.entry_path("ns", "small(Uniform).png");
        let other = store.entry_path("other", "originalImage.jpg");
        for path in [&first, &second, &other] {
            store.write(path, b"x").await.unwrap();
        }

        assert!(store.delete_namespace("ns").await.unwrap());
        assert!(!store.exists(&first).await.unwrap());
        assert!(!store.exists(&second).await.unwrap());
        assert!(store.exists(&other).await.unwrap());

        assert!(!store.delete_namespace("ns").await.unwrap());
        assert!(!store.delete_namespace("never-created").await.unwrap());
    }

    #[tokio::test]
    async fn etag_follows_content_not_timestamps() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.entry_path("ns", "originalImage.png");

        store.write(&path, b"aaaa").await.unwrap();
        let first = store.open(&path).await.unwrap().etag;
        assert_eq!(first, store.open(&path).await.unwrap().etag);

        // Same length, rewritten immediately: mtime may not move, the tag must
        store.delete_namespace("ns").await.unwrap();
        store.write(&path, b"bbbb").await.unwrap();
        let second = store.open(&path).await.unwrap();
        assert_ne!(first, second.etag);
        assert_eq!(read_all(second).await, b"bbbb");

        store.write(&path, b"aaaa").await.unwrap();
        assert_eq!(first, store.open(&path).await.unwrap().etag);
    }

    #[tokio::test]
    async fn long_namespaces_are_written_and_deleted() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let namespace = "Q".repeat(450);
        let path = store.entry_path(&namespace, "small(FillSquare).jpg");

        store.write(&path, b"x").await.unwrap();
        assert!(store.exists(&path).await.unwrap());
        assert!(store.delete_namespace(&namespace).await.unwrap());
        assert!(!store.exists(&path).await.unwrap());
        assert!(!store.delete_namespace(&namespace).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_prefix_namespace_keeps_the_longer_one() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let short = "a".repeat(200);
        let long = format!("{}bcd", short);
        let short_entry = store.entry_path(&short, "originalImage.jpg");
        let long_entry = store.entry_path(&long, "originalImage.jpg");
        store.write(&short_entry, b"short").await.unwrap();
        store.write(&long_entry, b"long").await.unwrap();

        assert!(store.delete_namespace(&short).await.unwrap());
        assert!(!store.exists(&short_entry).await.unwrap());
        assert!(store.exists(&long_entry).await.unwrap());

        assert!(store.delete_namespace(&long).await.unwrap());
        assert!(!store.exists(&long_entry).await.unwrap());
    }
}
