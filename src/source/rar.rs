//! RAR/CBR archives.
//!
//! A non-solid archive stores every member independently, so each entry is
//! read by skipping straight to its header. A solid archive is one continuous
//! compressed stream: members cannot be reached without decompressing all the
//! ones before them. For those, listing performs a single sequential pass that
//! captures every wanted member into memory, and [`RarLoader::open`] hands the
//! buffers out.
//!
//! The solid flag is read from the archive header before listing; the strategy
//! is never guessed from access failures.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use unrar::Archive;

use crate::error::{PageError, Result};
use crate::path_utils::is_ignored_member;
use crate::source::{PageLoader, RawPage, SourceOptions, number_entries, read_error, unexpected_locator};
use crate::types::{EntryLocator, PageEntry, get_file_info};

/// Access strategy chosen from the archive flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RarAccess {
    /// Members are opened individually, in any order.
    Random,
    /// Members are captured during one sequential pass.
    Sequential,
}

pub struct RarLoader {
    path: PathBuf,
    access: RarAccess,
    buffers: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl RarLoader {
    pub fn open(path: &Path) -> Result<Self> {
        let listing = Archive::new(path).open_for_listing()?;
        let access = if listing.is_solid() {
            RarAccess::Sequential
        } else {
            RarAccess::Random
        };
        debug!("RAR archive {:?} uses {:?} access", path, access);

        Ok(Self {
            path: path.to_path_buf(),
            access,
            buffers: Mutex::new(HashMap::new()),
        })
    }

    pub fn access(&self) -> RarAccess {
        self.access
    }

    /// Decompresses the whole archive once, keeping the wanted members.
    fn capture(&self, wanted: &HashSet<PathBuf>) -> Result<()> {
        let mut captured = HashMap::with_capacity(wanted.len());
        let mut archive = Archive::new(&self.path).open_for_processing()?;

        while let Some(header) = archive.read_header()? {
            let member = header.entry().filename.clone();
            archive = if header.entry().is_file() && wanted.contains(&member) {
                let (bytes, rest) = header.read()?;
                captured.insert(member, bytes);
                rest
            } else {
                header.skip()?
            };
        }

        debug!("Captured {} member(s) from solid archive {:?}", captured.len(), self.path);
        let mut buffers = self
            .buffers
            .lock()
            .map_err(|_| "RAR buffer lock poisoned".to_string())?;
        *buffers = captured;
        Ok(())
    }

    fn read_member(&self, member: &Path) -> std::result::Result<Option<Vec<u8>>, unrar::error::UnrarError> {
        let mut archive = Archive::new(&self.path).open_for_processing()?;
        while let Some(header) = archive.read_header()? {
            if header.entry().is_file() && header.entry().filename == member {
                let (bytes, _) = header.read()?;
                return Ok(Some(bytes));
            }
            archive = header.skip()?;
        }
        Ok(None)
    }
}

impl PageLoader for RarLoader {
    fn list(&self, options: &SourceOptions) -> Result<Vec<PageEntry>> {
        let mut candidates = Vec::new();

        for header in Archive::new(&self.path).open_for_listing()? {
            let header = header?;
            if header.is_directory() {
                continue;
            }
            let member = header.filename.to_string_lossy().replace('\\', "/");
            if is_ignored_member(&member) || get_file_info(&member, options.accept_tiff).is_none() {
                continue;
            }
            candidates.push((member, EntryLocator::RarMember(header.filename.clone())));
        }

        let entries = number_entries(candidates, options.sort_mode);

        if self.access == RarAccess::Sequential {
            let wanted: HashSet<PathBuf> = entries
                .iter()
                .filter_map(|entry| match &entry.locator {
                    EntryLocator::RarMember(member) => Some(member.clone()),
                    _ => None,
                })
                .collect();
            self.capture(&wanted)?;
        }

        Ok(entries)
    }

    fn open(&self, entry: &PageEntry) -> std::result::Result<RawPage, PageError> {
        let EntryLocator::RarMember(member) = &entry.locator else {
            return Err(unexpected_locator(entry));
        };

        let bytes = match self.access {
            RarAccess::Sequential => self
                .buffers
                .lock()
                .map_err(|_| read_error(entry, "RAR buffer lock poisoned"))?
                .remove(member),
            RarAccess::Random => self.read_member(member).map_err(|e| read_error(entry, e))?,
        };

        bytes
            .map(RawPage::Encoded)
            .ok_or_else(|| read_error(entry, "member not found in archive"))
    }
}
