// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Scratch directories owned by a service and removed when the pool closes.

use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Allocates uniquely named directories and deletes all of them on [`close`](Self::close) or drop.
#[derive(Debug)]
pub struct ScratchDirectoryPool {
    prefix: String,
    root: Option<PathBuf>,
    directories: Mutex<Vec<TempDir>>,
}

impl ScratchDirectoryPool {
    /// Creates a pool whose directories are named `<prefix>-<random>` under `root`
    /// (the system temp dir when `None`).
    #[must_use]
    pub fn new(prefix: impl Into<String>, root: Option<&Path>) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.map(Path::to_path_buf),
            directories: Mutex::new(Vec::new()),
        }
    }

    /// Creates and tracks a new directory.
    pub fn allocate(&self) -> io::Result<PathBuf> {
        let prefix = format!("{}-", self.prefix);
        let directory = match &self.root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix(&prefix).tempdir()?,
        };
        let path = directory.path().to_path_buf();
        self.directories.lock().push(directory);
        tracing::debug!(path = %path.display(), "allocated scratch directory");
        Ok(path)
    }

    /// Number of directories currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.directories.lock().len()
    }

    /// Deletes every tracked directory. Failures are logged and do not stop the sweep.
    pub fn close(&self) {
        let directories: Vec<TempDir> = std::mem::take(&mut *self.directories.lock());
        for directory in directories {
            let path = directory.path().to_path_buf();
            if let Err(error) = directory.close() {
                tracing::warn!(path = %path.display(), %error, "failed to delete scratch directory");
            }
        }
    }
}

impl Drop for ScratchDirectoryPool {
    fn drop(&mut self) {
        self.close();
    }
}
