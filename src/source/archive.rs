//! ZIP/CBZ archives.
//!
//! The archive is memory-mapped once; each read clones the parsed archive
//! handle (cheap, shares the central directory) so workers never contend on
//! a reader.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};
use zip::ZipArchive;

use crate::error::{PageError, Result};
use crate::path_utils::is_ignored_member;
use crate::source::{PageLoader, RawPage, SourceOptions, number_entries, read_error, unexpected_locator};
use crate::types::{EntryLocator, PageEntry, get_file_info};

/// Read-only mapping shared between archive handles.
#[derive(Clone)]
struct SharedMap(Arc<Mmap>);

impl AsRef<[u8]> for SharedMap {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

pub struct ZipLoader {
    archive: ZipArchive<Cursor<SharedMap>>,
}

impl ZipLoader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and the source is not modified during a run.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let archive = ZipArchive::new(Cursor::new(SharedMap(Arc::new(mmap))))?;
        Ok(Self { archive })
    }
}

impl PageLoader for ZipLoader {
    fn list(&self, options: &SourceOptions) -> Result<Vec<PageEntry>> {
        let mut archive = self.archive.clone();
        let mut candidates = Vec::new();

        for index in 0..archive.len() {
            let file = archive.by_index_raw(index)?;
            if file.is_dir() {
                continue;
            }
            let member = file.name().to_string();
            if is_ignored_member(&member) || get_file_info(&member, options.accept_tiff).is_none() {
                continue;
            }
            candidates.push((member, EntryLocator::ZipIndex(index)));
        }

        Ok(number_entries(candidates, options.sort_mode))
    }

    fn open(&self, entry: &PageEntry) -> std::result::Result<RawPage, PageError> {
        let EntryLocator::ZipIndex(index) = entry.locator else {
            return Err(unexpected_locator(entry));
        };
        let mut archive = self.archive.clone();
        let mut file = archive.by_index(index).map_err(|e| read_error(entry, e))?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| read_error(entry, e))?;
        Ok(RawPage::Encoded(bytes))
    }
}
