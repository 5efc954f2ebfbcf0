// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filesystem adapter.
//!
//! The queue talks to disk exclusively through [`FileSystem`], so tests and
//! embedders can substitute their own implementation. [`StdFileSystem`] is
//! the `std::fs` adapter used in production. Renames are expected to be
//! atomic within a directory, which holds for every POSIX filesystem the
//! queue targets.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

/// An open append handle to the current file.
///
/// The engine owns exactly one of these at a time; it is flushed, synced and
/// dropped before the finalize rename.
pub trait QueueFile: Write + Send {
    /// Force written bytes down to the device.
    fn sync(&mut self) -> io::Result<()>;
}

impl QueueFile for File {
    fn sync(&mut self) -> io::Result<()> { self.sync_data() }
}

/// The filesystem operations the queue needs.
pub trait FileSystem: Send + Sync {
    /// Create the directory and any missing parents.
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Create a fresh file for appending, truncating any existing one.
    fn create_append(&self, path: &Path) -> io::Result<Box<dyn QueueFile>>;

    /// Open an existing file for appending, preserving its contents.
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn QueueFile>>;

    /// Atomically rename within a directory.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Size of a file in bytes.
    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Basenames of the plain files in a directory, in no particular order.
    fn scan_dir(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Join a directory with a basename.
    fn join(&self, dir: &Path, name: &str) -> PathBuf { dir.join(name) }
}

/// `std::fs`-backed adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()> { std::fs::create_dir_all(dir) }

    fn create_append(&self, path: &Path) -> io::Result<Box<dyn QueueFile>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(file))
    }

    fn open_append(&self, path: &Path) -> io::Result<Box<dyn QueueFile>> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Box::new(file))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> { std::fs::rename(from, to) }

    fn remove(&self, path: &Path) -> io::Result<()> { std::fs::remove_file(path) }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn scan_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_create_truncates_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.bin");
        let fs = StdFileSystem;

        {
            let mut f = fs.create_append(&path).unwrap();
            f.write_all(b"old contents").unwrap();
            f.sync().unwrap();
        }
        {
            let mut f = fs.create_append(&path).unwrap();
            f.write_all(b"new").unwrap();
            f.sync().unwrap();
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_open_append_preserves_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.bin");
        let fs = StdFileSystem;

        std::fs::write(&path, b"first|").unwrap();
        {
            let mut f = fs.open_append(&path).unwrap();
            f.write_all(b"second").unwrap();
            f.sync().unwrap();
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"first|second");
        assert_eq!(fs.file_size(&path).unwrap(), 12);
    }

    #[test]
    fn test_rename_and_remove() {
        let dir = TempDir::new().unwrap();
        let fs = StdFileSystem;
        let from = dir.path().join("a.bin");
        let to = dir.path().join("b.bin");

        std::fs::write(&from, b"payload").unwrap();
        fs.rename(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"payload");

        fs.remove(&to).unwrap();
        assert!(!to.exists());
    }

    #[test]
    fn test_scan_dir_skips_subdirectories() {
        let dir = TempDir::new().unwrap();
        let fs = StdFileSystem;

        std::fs::write(dir.path().join("one.bin"), b"1").unwrap();
        std::fs::write(dir.path().join("two.bin"), b"2").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut names = fs.scan_dir(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["one.bin".to_string(), "two.bin".to_string()]);
    }

    #[test]
    fn test_file_size_of_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let fs = StdFileSystem;
        let err = fs.file_size(&dir.path().join("missing.bin")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
