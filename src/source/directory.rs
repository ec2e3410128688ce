//! Directory trees of loose image files.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{PageError, Result};
use crate::path_utils::is_ignored_member;
use crate::source::{PageLoader, RawPage, SourceOptions, member_name, number_entries, read_error, unexpected_locator};
use crate::types::{EntryLocator, PageEntry, get_file_info};

/// Walks a directory recursively and reads each image file on demand.
#[derive(Debug)]
pub struct DirectoryLoader {
    base_directory: PathBuf,
}

impl DirectoryLoader {
    pub fn new(base_directory: &Path) -> Self {
        Self {
            base_directory: base_directory.to_path_buf(),
        }
    }
}

impl PageLoader for DirectoryLoader {
    fn list(&self, options: &SourceOptions) -> Result<Vec<PageEntry>> {
        let mut candidates = Vec::new();

        for dir_entry in WalkDir::new(&self.base_directory).follow_links(true) {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type().is_file() {
                continue;
            }
            let Some(member) = member_name(&self.base_directory, dir_entry.path()) else {
                continue;
            };
            if is_ignored_member(&member) || get_file_info(&member, options.accept_tiff).is_none() {
                continue; // Unsupported or hidden files are skipped silently
            }
            candidates.push((member, EntryLocator::File(dir_entry.into_path())));
        }

        Ok(number_entries(candidates, options.sort_mode))
    }

    fn open(&self, entry: &PageEntry) -> std::result::Result<RawPage, PageError> {
        match &entry.locator {
            EntryLocator::File(path) => std::fs::read(path)
                .map(RawPage::Encoded)
                .map_err(|e| read_error(entry, e)),
            _ => Err(unexpected_locator(entry)),
        }
    }
}
