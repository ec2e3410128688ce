//! Core data types, enums, and reports for the Kiritori conversion library.
//!
//! This module defines the fundamental data structures used throughout Kiritori:
//! - Option enums (`FileFormat`, `ImageEncoding`, `GrayscaleMode`, `SortPathMode`, `Direction`)
//! - Per-run transform settings (`CropOptions`, `TransformOptions`)
//! - Pipeline units (`PageEntry`, `PageDescriptor`, `Part`)
//! - Reporting types (`Progress`, `ConversionReport`)
//! - Comprehensive metadata (`EbookMetadata`)

use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, PageError, Result};

/// Defines the container format of the generated bundle(s).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum FileFormat {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "EPUB"))]
    Epub,
    #[cfg_attr(feature = "serde", serde(rename = "CBZ"))]
    Cbz,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Epub => "epub",
            FileFormat::Cbz => "cbz",
        }
    }
}

/// Reading direction. `Rtl` is manga order: right half first when splitting.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ltr => f.write_str("ltr"),
            Direction::Rtl => f.write_str("rtl"),
        }
    }
}

/// How processed rasters are encoded into the image store.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum ImageEncoding {
    #[default]
    Jpeg,
    Png,
    /// Source bytes are stored verbatim; no filter is applied.
    Copy,
}

/// Grayscale reducer applied as the last filter.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum GrayscaleMode {
    /// Perceptual weights (Rec. 601: 0.299, 0.587, 0.114)
    #[default]
    Normal,
    /// Arithmetic mean of the three channels
    Average,
    /// Luminance weights (Rec. 709: 0.2126, 0.7152, 0.0722)
    Luminance,
}

/// Which path components are compared numerically when sorting entries.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum SortPathMode {
    /// Every component compares as plain text.
    Plain,
    /// Directory names are split into text prefix and numeric suffix.
    #[default]
    Directories,
    /// Directory names and the file name are split.
    Full,
}

impl SortPathMode {
    pub fn from_index(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(SortPathMode::Plain),
            1 => Some(SortPathMode::Directories),
            2 => Some(SortPathMode::Full),
            _ => None,
        }
    }
}

/// The four container kinds a source can be read from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum ContainerKind {
    Directory,
    Zip,
    Rar,
    Pdf,
}

impl ContainerKind {
    /// Selects the container kind from the path: directories first, then the
    /// (case-insensitive) extension.
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(ContainerKind::Directory);
        }
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "zip" | "cbz" => Ok(ContainerKind::Zip),
            "rar" | "cbr" => Ok(ContainerKind::Rar),
            "pdf" => Ok(ContainerKind::Pdf),
            _ => Err(Error::UnsupportedContainer(format!(
                "{:?} (expected a directory, .cbz, .zip, .cbr, .rar or .pdf)",
                path
            ))),
        }
    }
}

/// Margin detection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct CropOptions {
    pub enabled: bool,
    /// Share (percent) of non-blank pixels tolerated in a margin line, per edge.
    pub ratio_left: u32,
    pub ratio_up: u32,
    pub ratio_right: u32,
    pub ratio_bottom: u32,
    /// Maximum share (percent) of a dimension that may be cropped, 0 = unlimited.
    pub limit: u32,
    /// When the limit is hit, keep the original bounds instead of clamping.
    pub skip_if_limit_reached: bool,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio_left: 1,
            ratio_up: 1,
            ratio_right: 1,
            ratio_bottom: 1,
            limit: 0,
            skip_if_limit_reached: false,
        }
    }
}

/// Per-run settings consumed by the transform pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    pub crop: CropOptions,
    pub auto_rotate: bool,
    pub auto_contrast: bool,
    pub brightness: i32,
    pub contrast: i32,
    pub view_width: u32,
    pub view_height: u32,
    pub grayscale: Option<GrayscaleMode>,
    pub auto_split_double_page: bool,
    pub keep_double_page_if_split: bool,
    pub direction: Direction,
    pub has_cover: bool,
    pub encoding: ImageEncoding,
    pub quality: u8,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            crop: CropOptions::default(),
            auto_rotate: false,
            auto_contrast: true,
            brightness: 0,
            contrast: 0,
            view_width: 1072,
            view_height: 1448,
            grayscale: Some(GrayscaleMode::Normal),
            auto_split_double_page: false,
            keep_double_page_if_split: true,
            direction: Direction::Ltr,
            has_cover: true,
            encoding: ImageEncoding::Jpeg,
            quality: 85,
        }
    }
}

/// Comprehensive metadata for an ebook, embedded in every generated bundle.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EbookMetadata {
    pub title: String,
    pub series: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub language: String, // e.g., "en", "ja"
    pub identifier: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
}

impl EbookMetadata {
    /// Creates a default `EbookMetadata` instance with a specified title and default language "en".
    pub fn default_with_title(title: String) -> Self {
        Self {
            title,
            language: "en".to_string(),
            ..Default::default()
        }
    }
}

/// Where the bytes of an entry live inside its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLocator {
    /// A file on disk (directory sources).
    File(PathBuf),
    /// Index into the ZIP central directory.
    ZipIndex(usize),
    /// Member name inside a RAR archive.
    RarMember(PathBuf),
    /// 1-based PDF page number.
    PdfPage(u32),
}

/// One unit of raw input, produced by the source listing.
///
/// Holds names and a locator only; the raster is materialised by the worker
/// that claims the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    /// 0-based position in natural sort order.
    pub id: usize,
    /// Directory of the entry inside its container, `/` separated.
    pub path: String,
    /// File name of the entry.
    pub name: String,
    pub locator: EntryLocator,
}

impl PageEntry {
    /// `path/name`, as shown in logs and placeholders.
    pub fn display_name(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }
}

/// One output page: the whole page (`part = 0`) or a split half (`1`, `2`).
#[derive(Debug, Clone)]
pub struct PageDescriptor {
    pub id: usize,
    pub part: u8,
    pub width: u32,
    pub height: u32,
    pub is_double_page: bool,
    pub is_blank: bool,
    /// Retained only for the cover, to derive the title page later.
    pub raw: Option<DynamicImage>,
    pub original_aspect_ratio: f32,
    pub error: Option<PageError>,
    pub path: String,
    pub name: String,
    /// Extension of the stored asset (`jpg`, `png`, ...).
    pub extension: &'static str,
    /// Size of the stored asset in bytes.
    pub size: u64,
}

impl PageDescriptor {
    /// Deterministic key of the asset inside the image store and the bundles.
    pub fn key(&self) -> String {
        format!("images/{:05}_{}.{}", self.id, self.part, self.extension)
    }

    pub fn order_key(&self) -> (usize, u8) {
        (self.id, self.part)
    }
}

/// Store key of the generated title page.
pub const TITLE_PAGE_KEY: &str = "images/title.jpg";

/// The generated title page, stored once and repeated in every part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitlePage {
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// A size-budgeted run of pages forming one deliverable bundle.
#[derive(Debug, Clone)]
pub struct Part {
    pub cover: PageDescriptor,
    pub pages: Vec<PageDescriptor>,
}

/// Emitted once every descriptor of an entry has been produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Progress {
    pub id: usize,
    pub done: usize,
    pub total: usize,
}

/// Outcome of a full conversion.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub bundles: Vec<PathBuf>,
    pub entries: usize,
    pub descriptors: usize,
    pub parts: usize,
    /// Entries replaced by a placeholder page, with the reason.
    pub page_errors: Vec<(String, PageError)>,
}

/// Utility function: Determines stored extension and MIME type from a file name.
///
/// # Supported formats
///
/// - JPEG/JPG: image/jpeg
/// - PNG: image/png
/// - WebP: image/webp
/// - TIFF/TIF: image/tiff (only when `accept_tiff` is set)
pub fn get_file_info(name: &str, accept_tiff: bool) -> Option<(&'static str, &'static str)> {
    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())?;

    match extension.as_str() {
        "jpg" | "jpeg" => Some(("jpg", "image/jpeg")),
        "png" => Some(("png", "image/png")),
        "webp" => Some(("webp", "image/webp")),
        "tif" | "tiff" if accept_tiff => Some(("tiff", "image/tiff")),
        _ => None,
    }
}

/// MIME type of a stored asset extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "webp" => "image/webp",
        "tiff" => "image/tiff",
        _ => "image/jpeg",
    }
}
