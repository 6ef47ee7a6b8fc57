// src/fs/mock.rs

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::FileSystem;

/// In-memory filesystem for tests.
///
/// Directories exist implicitly as ancestors of added files.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    dirs: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        if let Ok(mut dirs) = self.dirs.lock() {
            dirs.extend(path.ancestors().skip(1).map(Path::to_path_buf));
        }
        if let Ok(mut files) = self.files.lock() {
            files.insert(path, content.into());
        }
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        if let Ok(mut files) = self.files.lock() {
            files.remove(path.as_ref());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self
            .files
            .lock()
            .map_err(|_| anyhow!("mock filesystem lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().is_ok_and(|files| files.contains_key(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.lock().is_ok_and(|dirs| dirs.contains(path))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // Tests use absolute paths; nothing to resolve.
        Ok(path.to_path_buf())
    }
}
