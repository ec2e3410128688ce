//! Temporary image store.
//!
//! Every processed asset is written once into a single ZIP file next to the
//! output, keyed by [`PageDescriptor::key`](crate::types::PageDescriptor::key).
//! Assets are already-compressed images, so entries are stored without
//! compression: the local header then records the final size and CRC, and the
//! packager can raw-copy an entry into any number of bundles without
//! re-encoding it.
//!
//! Writers serialize on a mutex; encoding happens before the lock is taken.
//! The file is deleted when the store (or its reader) is dropped.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Removes the backing file on drop.
#[derive(Debug)]
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(&self.0) {
                debug!("Could not remove temporary store {:?}: {}", self.0, e);
            }
        }
    }
}

pub struct ImageStore {
    writer: Mutex<Option<ZipWriter<File>>>,
    options: SimpleFileOptions,
    file: TempFile,
}

impl ImageStore {
    /// Creates an empty store file inside `directory`.
    pub fn create(directory: &Path) -> Result<Self> {
        let path = directory.join(format!(
            ".kiritori-{}-{}.zip",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        let file = File::create(&path)?;
        debug!("Image store created at {:?}", path);

        Ok(Self {
            writer: Mutex::new(Some(ZipWriter::new(file))),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            file: TempFile(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file.0
    }

    /// Appends one asset and returns its stored size.
    pub fn add(&self, key: &str, bytes: &[u8]) -> Result<u64> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| Error::Store("writer lock poisoned".to_string()))?;
        let zip = guard
            .as_mut()
            .ok_or_else(|| Error::Store("store already finished".to_string()))?;

        zip.start_file(key, self.options)?;
        zip.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Closes the writer and reopens the file for raw copies.
    pub fn finish(self) -> Result<StoreReader> {
        let zip = self
            .writer
            .lock()
            .map_err(|_| Error::Store("writer lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| Error::Store("store already finished".to_string()))?;
        zip.finish()?;

        let archive = ZipArchive::new(File::open(&self.file.0)?)?;
        debug!("Image store sealed with {} asset(s)", archive.len());
        Ok(StoreReader {
            archive,
            _file: self.file,
        })
    }
}

/// Read side of a finished [`ImageStore`].
pub struct StoreReader {
    archive: ZipArchive<File>,
    // Declared last so the archive handle closes before the file is removed.
    _file: TempFile,
}

impl StoreReader {
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.archive.index_for_name(key).is_some()
    }

    /// Stored size of an asset, as it will be copied into a bundle.
    pub fn size_of(&mut self, key: &str) -> Result<u64> {
        let index = self.index(key)?;
        Ok(self.archive.by_index_raw(index)?.compressed_size())
    }

    /// Copies an asset into `writer` under `name` without decompressing it.
    pub fn copy_into<W: Write + Seek>(
        &mut self,
        key: &str,
        writer: &mut ZipWriter<W>,
        name: &str,
    ) -> Result<()> {
        let index = self.index(key)?;
        let file = self.archive.by_index_raw(index)?;
        writer.raw_copy_file_rename(file, name)?;
        Ok(())
    }

    fn index(&self, key: &str) -> Result<usize> {
        self.archive
            .index_for_name(key)
            .ok_or_else(|| Error::Store(format!("missing asset {}", key)))
    }
}
