//! Byte sources for archives
//!
//! The archive reader never touches the filesystem itself; it asks a
//! [`FileProvider`] for a seekable byte source by path.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

/// Seekable byte source an archive is read from
pub trait ArchiveSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ArchiveSource for T {}

/// Opens archive byte sources by path
pub trait FileProvider {
    /// Open `path` for reading
    fn open(&self, path: &str) -> io::Result<Box<dyn ArchiveSource>>;
}

/// Provider reading files below a root directory
#[derive(Debug, Clone)]
pub struct DiskProvider {
    root: PathBuf,
}

impl DiskProvider {
    /// Provider rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split(['\\', '/'])
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl FileProvider for DiskProvider {
    fn open(&self, path: &str) -> io::Result<Box<dyn ArchiveSource>> {
        let full = self.resolve(path);
        debug!("Opening {}", full.display());
        let file = File::open(&full)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Provider serving in-memory buffers
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    files: HashMap<String, Bytes>,
}

impl MemoryProvider {
    /// Empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` at `path`, replacing any previous buffer
    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.files.insert(path.into(), data.into());
    }

    /// Serve `data` at `path`
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }
}

impl FileProvider for MemoryProvider {
    fn open(&self, path: &str) -> io::Result<Box<dyn ArchiveSource>> {
        let data = self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
        })?;
        Ok(Box::new(Cursor::new(data)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_memory_provider() {
        let provider = MemoryProvider::new().with_file("a.mpq", vec![1u8, 2, 3]);

        let mut source = provider.open("a.mpq").unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);

        let err = provider.open("b.mpq").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_disk_provider_backslash_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut file = File::create(dir.path().join("sub").join("d2data.mpq")).unwrap();
        file.write_all(b"MPQ").unwrap();

        let provider = DiskProvider::new(dir.path());
        let mut source = provider.open("sub\\d2data.mpq").unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"MPQ");

        assert!(provider.open("missing.mpq").is_err());
    }
}
