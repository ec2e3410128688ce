//! Source loading: turns a container into an ordered list of [`PageEntry`]s
//! and hands out each entry's bytes on demand.
//!
//! The container kind is detected once, when the source is opened, and the
//! matching [`PageLoader`] is kept for the rest of the run:
//!
//! - [`DirectoryLoader`]: recursive walk of a folder tree
//! - [`ZipLoader`]: memory-mapped ZIP/CBZ, members read independently
//! - [`RarLoader`]: RAR/CBR, random access for non-solid archives and a single
//!   buffered pass for solid ones
//! - [`PdfLoader`]: one entry per page, raster taken from the page images
//!
//! Listing failures are fatal. Reading a single entry never is: [`PageLoader::open`]
//! reports a [`PageError`] that the pipeline turns into a placeholder page.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{debug, info};

use crate::error::{Error, PageError, Result};
use crate::natsort::sort_by_path;
use crate::path_utils::split_member;
use crate::types::{ContainerKind, EntryLocator, PageEntry, SortPathMode};

pub mod archive;
pub mod directory;
pub mod pdf;
pub mod rar;

pub use archive::ZipLoader;
pub use directory::DirectoryLoader;
pub use pdf::PdfLoader;
pub use rar::RarLoader;

/// Listing settings shared by every loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceOptions {
    pub sort_mode: SortPathMode,
    /// Also accept `.tif`/`.tiff` members.
    pub accept_tiff: bool,
}

/// Bytes of an entry as handed to the pipeline.
#[derive(Debug, Clone)]
pub enum RawPage {
    /// Still-encoded image file bytes.
    Encoded(Vec<u8>),
    /// A raster the loader had to decode itself (PDF streams without a file format).
    Decoded(DynamicImage),
}

/// Common capability of all container loaders.
pub trait PageLoader: Send + Sync {
    /// Lists the supported image entries, sorted and numbered from 0.
    fn list(&self, options: &SourceOptions) -> Result<Vec<PageEntry>>;

    /// Reads the bytes of one listed entry.
    fn open(&self, entry: &PageEntry) -> std::result::Result<RawPage, PageError>;
}

/// A container opened for reading, one variant per supported kind.
pub enum Source {
    Directory(DirectoryLoader),
    Zip(ZipLoader),
    Rar(RarLoader),
    Pdf(PdfLoader),
}

impl Source {
    /// Detects the container kind of `path` and prepares the matching loader.
    pub fn open(path: &Path) -> Result<Self> {
        let kind = ContainerKind::detect(path)?;
        if kind != ContainerKind::Directory && !path.is_file() {
            return Err(Error::NotFound(format!("Source file does not exist: {:?}", path)));
        }
        debug!("Opening {:?} as {:?}", path, kind);

        Ok(match kind {
            ContainerKind::Directory => Source::Directory(DirectoryLoader::new(path)),
            ContainerKind::Zip => Source::Zip(ZipLoader::open(path)?),
            ContainerKind::Rar => Source::Rar(RarLoader::open(path)?),
            ContainerKind::Pdf => Source::Pdf(PdfLoader::open(path)?),
        })
    }

    pub fn kind(&self) -> ContainerKind {
        match self {
            Source::Directory(_) => ContainerKind::Directory,
            Source::Zip(_) => ContainerKind::Zip,
            Source::Rar(_) => ContainerKind::Rar,
            Source::Pdf(_) => ContainerKind::Pdf,
        }
    }

    fn loader(&self) -> &dyn PageLoader {
        match self {
            Source::Directory(loader) => loader,
            Source::Zip(loader) => loader,
            Source::Rar(loader) => loader,
            Source::Pdf(loader) => loader,
        }
    }

    /// Lists the entries, failing with [`Error::NoImagesFound`] when nothing matched.
    pub fn list(&self, origin: &Path, options: &SourceOptions) -> Result<Vec<PageEntry>> {
        let entries = self.loader().list(options)?;
        if entries.is_empty() {
            return Err(Error::NoImagesFound(origin.to_path_buf()));
        }
        info!("Listed {} page(s) from {:?}", entries.len(), origin);
        Ok(entries)
    }

    pub fn open_entry(&self, entry: &PageEntry) -> std::result::Result<RawPage, PageError> {
        self.loader().open(entry)
    }
}

/// Sorts member candidates in natural order and numbers them from 0.
pub(crate) fn number_entries(
    candidates: Vec<(String, EntryLocator)>,
    mode: SortPathMode,
) -> Vec<PageEntry> {
    sort_by_path(candidates, mode, |(member, _)| member.clone())
        .into_iter()
        .enumerate()
        .map(|(id, (member, locator))| {
            let (path, name) = split_member(&member);
            PageEntry {
                id,
                path,
                name,
                locator,
            }
        })
        .collect()
}

pub(crate) fn read_error(entry: &PageEntry, reason: impl ToString) -> PageError {
    PageError::Read {
        name: entry.display_name(),
        reason: reason.to_string(),
    }
}

pub(crate) fn unexpected_locator(entry: &PageEntry) -> PageError {
    read_error(entry, format!("unexpected locator {:?}", entry.locator))
}

/// Relative `/`-separated member name of `path` below `base`.
pub(crate) fn member_name(base: &Path, path: &Path) -> Option<String> {
    let relative: PathBuf = path.strip_prefix(base).ok()?.to_path_buf();
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
