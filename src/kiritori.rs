use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::fs;
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::generator::renderer_for;
use crate::packager::{Packager, plan_parts};
use crate::path_utils::{sanitize_filename, validate_path};
use crate::pool::{Job, ProgressCallback, WorkerPool};
use crate::source::{Source, SourceOptions};
use crate::store::ImageStore;
use crate::transform::placeholder::title_page;
use crate::transform::{Pipeline, encode};
use crate::types::{
    ContainerKind, ConversionReport, CropOptions, Direction, EbookMetadata, FileFormat,
    GrayscaleMode, ImageEncoding, PageDescriptor, PageEntry, SortPathMode, TITLE_PAGE_KEY,
    TitlePage, TransformOptions,
};

/// Smallest accepted non-zero size budget, in megabytes.
pub const MIN_LIMIT_MB: u32 = 20;

/// The main Kiritori conversion configuration, built declaratively using the builder pattern.
///
/// One configuration describes one conversion: a source container (directory,
/// CBZ/ZIP, CBR/RAR or PDF), the per-page transforms, and the output format.
/// [`convert`](KiritoriConfig::convert) runs the whole pipeline:
///
/// 1. list the source entries in natural order
/// 2. transform every entry on a worker pool, storing the encoded pages in a
///    temporary image store inside the target directory
/// 3. split the sorted pages into size-budgeted parts
/// 4. write one EPUB or CBZ bundle per part
///
/// ## Builder Pattern
///
/// ```rust,no_run
/// # use kiritori::prelude::*;
/// # use std::path::PathBuf;
/// let config = KiritoriConfig::builder()
///     .metadata(EbookMetadata::default_with_title("My Book".to_string()))
///     .source_path(PathBuf::from("./my_book.cbz"))
///     .target_path(PathBuf::from("./output"))
///     .output_format(FileFormat::Epub)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KiritoriConfig {
    // --- Core Conversion Settings ---
    /// Ebook metadata embedded in every bundle. The title also names the files.
    #[builder(default = "EbookMetadata::default_with_title(\"Untitled Conversion\".to_string())")]
    pub metadata: EbookMetadata,

    /// Source container: a directory, or a `.cbz`/`.zip`, `.cbr`/`.rar` or `.pdf` file.
    #[builder(default)]
    pub source_path: PathBuf,

    /// Directory the bundles are written to.
    ///
    /// If [`create_output_directory`](KiritoriConfig::create_output_directory) is true,
    /// a subdirectory named after the ebook title is created here.
    #[builder(default)]
    pub target_path: PathBuf,

    #[builder(default = "FileFormat::Epub")]
    pub output_format: FileFormat,

    /// `Rtl` is manga order: split pages start with the right half and the
    /// bundles declare right-to-left page progression.
    #[builder(default = "Direction::Ltr")]
    pub reading_direction: Direction,

    #[builder(default = "true")]
    pub create_output_directory: bool,

    // --- Source Settings ---
    #[builder(default = "SortPathMode::Directories")]
    pub sort_path_mode: SortPathMode,

    /// Also accept `.tif`/`.tiff` entries.
    #[builder(default = "false")]
    pub accept_tiff: bool,

    // --- Page Transforms ---
    #[builder(default)]
    pub crop: CropOptions,

    #[builder(default = "false")]
    pub auto_rotate: bool,

    #[builder(default = "true")]
    pub auto_contrast: bool,

    /// -100..=100, 0 leaves the page untouched.
    #[builder(default = "0")]
    pub brightness: i32,

    /// -100..=100, 0 leaves the page untouched.
    #[builder(default = "0")]
    pub contrast: i32,

    /// Target device width in pixels.
    #[builder(default = "1072")]
    pub view_width: u32,

    /// Target device height in pixels.
    #[builder(default = "1448")]
    pub view_height: u32,

    #[builder(default = "true")]
    pub grayscale: bool,

    #[builder(default = "GrayscaleMode::Normal")]
    pub grayscale_mode: GrayscaleMode,

    #[builder(default = "false")]
    pub auto_split_double_page: bool,

    /// When splitting, also keep the whole double page before its halves.
    #[builder(default = "true")]
    pub keep_double_page_if_split: bool,

    /// Treat the first entry as the cover: never split, shown first in every part.
    #[builder(default = "true")]
    pub has_cover: bool,

    #[builder(default = "true")]
    pub remove_blank_pages: bool,

    /// Insert a page derived from the cover, with the title on it, after the cover.
    #[builder(default = "false")]
    pub add_title_page: bool,

    // --- Output Settings ---
    #[builder(default = "ImageEncoding::Jpeg")]
    pub image_encoding: ImageEncoding,

    /// JPEG quality, 1..=100.
    #[builder(default = "85")]
    pub image_quality: u8,

    /// Size budget per bundle in megabytes; 0 writes a single bundle.
    #[builder(default = "0")]
    pub limit_mb: u32,

    /// Number of pages processed in parallel.
    #[builder(default = "num_cpus::get()")]
    pub workers: usize,

    /// Called once per source entry when its pages are done.
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(skip))]
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for KiritoriConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiritoriConfig")
            .field("metadata", &self.metadata)
            .field("source_path", &self.source_path)
            .field("target_path", &self.target_path)
            .field("output_format", &self.output_format)
            .field("reading_direction", &self.reading_direction)
            .field("create_output_directory", &self.create_output_directory)
            .field("sort_path_mode", &self.sort_path_mode)
            .field("accept_tiff", &self.accept_tiff)
            .field("crop", &self.crop)
            .field("auto_rotate", &self.auto_rotate)
            .field("auto_contrast", &self.auto_contrast)
            .field("brightness", &self.brightness)
            .field("contrast", &self.contrast)
            .field("view_width", &self.view_width)
            .field("view_height", &self.view_height)
            .field("grayscale", &self.grayscale)
            .field("grayscale_mode", &self.grayscale_mode)
            .field("auto_split_double_page", &self.auto_split_double_page)
            .field("keep_double_page_if_split", &self.keep_double_page_if_split)
            .field("has_cover", &self.has_cover)
            .field("remove_blank_pages", &self.remove_blank_pages)
            .field("add_title_page", &self.add_title_page)
            .field("image_encoding", &self.image_encoding)
            .field("image_quality", &self.image_quality)
            .field("limit_mb", &self.limit_mb)
            .field("workers", &self.workers)
            .field(
                "progress",
                if self.progress.is_some() {
                    &"Some(Function)"
                } else {
                    &"None"
                },
            )
            .finish()
    }
}

impl KiritoriConfig {
    /// Creates a new builder for configuring `KiritoriConfig`.
    pub fn builder() -> KiritoriConfigBuilder {
        KiritoriConfigBuilder::default()
    }

    /// Validates the configuration and the paths without reading any content.
    ///
    /// [`convert`](KiritoriConfig::convert) calls this first, so calling it
    /// manually is only useful for early error reporting.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use kiritori::prelude::*;
    /// # use std::path::PathBuf;
    /// # fn main() -> kiritori::error::Result<()> {
    /// let config = KiritoriConfig::builder()
    ///     .metadata(EbookMetadata::default_with_title("Test".to_string()))
    ///     .source_path(PathBuf::from("./book.cbr"))
    ///     .target_path(PathBuf::from("./output"))
    ///     .build()?;
    ///
    /// config.preflight_check()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn preflight_check(&self) -> Result<&Self> {
        // --- Basic config validation (redundant with Builder::build) ---
        if self.metadata.title.is_empty() {
            return Err(Error::Other("Ebook title is required".to_string()));
        }
        if self.target_path.as_os_str().is_empty() {
            return Err(Error::Other("Target path is required".to_string()));
        }
        if self.limit_mb != 0 && self.limit_mb < MIN_LIMIT_MB {
            return Err(Error::Other(format!(
                "Size limit must be 0 or at least {} MB",
                MIN_LIMIT_MB
            )));
        }

        // --- Source checks ---
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Other("`source_path` must be set".to_string()));
        }
        validate_path(&self.source_path)?;
        if !self.source_path.exists() {
            return Err(Error::NotFound(format!(
                "Source path does not exist: {:?}",
                self.source_path
            )));
        }
        ContainerKind::detect(&self.source_path)?;

        Ok(self)
    }

    /// Per-page settings handed to the transform pipeline.
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            crop: self.crop,
            auto_rotate: self.auto_rotate,
            auto_contrast: self.auto_contrast,
            brightness: self.brightness,
            contrast: self.contrast,
            view_width: self.view_width,
            view_height: self.view_height,
            grayscale: self.grayscale.then_some(self.grayscale_mode),
            auto_split_double_page: self.auto_split_double_page,
            keep_double_page_if_split: self.keep_double_page_if_split,
            direction: self.reading_direction,
            has_cover: self.has_cover,
            encoding: self.image_encoding,
            quality: self.image_quality,
        }
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            sort_mode: self.sort_path_mode,
            accept_tiff: self.accept_tiff,
        }
    }

    /// Byte budget of one bundle, 0 for unlimited.
    pub fn budget_bytes(&self) -> u64 {
        self.limit_mb as u64 * 1024 * 1024
    }

    /// Runs the full conversion and reports what was written.
    ///
    /// Unreadable or undecodable pages do not fail the run: they are replaced
    /// by a placeholder page and listed in [`ConversionReport::page_errors`].
    pub async fn convert(&self) -> Result<ConversionReport> {
        self.preflight_check()?;
        let target_directory = self.prepare_target().await?;
        info!(
            "Converting {:?} into {:?} as {:?}",
            self.source_path, target_directory, self.output_format
        );

        // --- Listing ---
        let source_path = self.source_path.clone();
        let source_options = self.source_options();
        let (source, entries) = spawn_blocking(move || -> Result<(Source, Vec<PageEntry>)> {
            let source = Source::open(&source_path)?;
            let entries = source.list(&source_path, &source_options)?;
            Ok((source, entries))
        })
        .await??;
        let entry_count = entries.len();
        debug!("Source kind {:?}, {} worker(s)", source.kind(), self.workers);

        // --- Transform ---
        let source = Arc::new(source);
        let store = Arc::new(ImageStore::create(&target_directory)?);
        let pipeline = Arc::new(Pipeline::new(self.transform_options()));

        let job: Job = {
            let source = Arc::clone(&source);
            let store = Arc::clone(&store);
            let pipeline = Arc::clone(&pipeline);
            Arc::new(move |entry: PageEntry| -> Result<Vec<PageDescriptor>> {
                let raw = source.open_entry(&entry);
                let mut descriptors = Vec::new();
                for rendered in pipeline.process(&entry, raw)? {
                    let mut descriptor = rendered.descriptor;
                    descriptor.size = store.add(&descriptor.key(), &rendered.asset)?;
                    descriptors.push(descriptor);
                }
                Ok(descriptors)
            })
        };

        let descriptors = WorkerPool::new(self.workers)
            .run(entries, job, self.progress.clone())
            .await?;
        drop(source);

        let store = Arc::try_unwrap(store)
            .map_err(|_| Error::Store("image store still shared after processing".to_string()))?;

        // --- Packaging ---
        let config = self.clone();
        let (bundles, parts, descriptor_count, page_errors) = spawn_blocking(move || {
            let descriptor_count = descriptors.len();
            let page_errors: Vec<_> = descriptors
                .iter()
                .filter_map(|d| d.error.as_ref())
                .map(|error| (error.name().to_string(), error.clone()))
                .collect();
            if !page_errors.is_empty() {
                warn!("{} page(s) replaced by placeholders", page_errors.len());
            }

            let (mut cover, pages) = config.arrange(descriptors)?;

            let title = match (&cover.raw, config.add_title_page) {
                (Some(raw), true) => {
                    let page = title_page(
                        raw,
                        &config.metadata.title,
                        config.view_width,
                        config.view_height,
                    );
                    let (bytes, _) = encode(&page, ImageEncoding::Jpeg, config.image_quality)?;
                    let size = store.add(TITLE_PAGE_KEY, &bytes)?;
                    Some(TitlePage {
                        width: page.width(),
                        height: page.height(),
                        size,
                    })
                }
                _ => None,
            };
            cover.raw = None;

            let seed = cover.size + title.map_or(0, |t| t.size);
            let parts = plan_parts(&cover, pages, config.budget_bytes(), seed);
            info!("Planned {} part(s)", parts.len());

            let mut reader = store.finish()?;
            let renderer = renderer_for(config.output_format);
            let bundles = Packager::new(
                renderer.as_ref(),
                &config.metadata,
                config.reading_direction,
                &target_directory,
            )
            .write(&parts, title, &mut reader)?;

            Ok::<_, Error>((bundles, parts.len(), descriptor_count, page_errors))
        })
        .await??;

        info!("Conversion finished: {} bundle(s)", bundles.len());
        Ok(ConversionReport {
            bundles,
            entries: entry_count,
            descriptors: descriptor_count,
            parts,
            page_errors,
        })
    }

    /// Splits the sorted descriptors into the cover and the page run.
    ///
    /// Blank pages are dropped when configured; the cover is always kept.
    /// Without a dedicated cover, the first page doubles as the cover image.
    fn arrange(
        &self,
        descriptors: Vec<PageDescriptor>,
    ) -> Result<(PageDescriptor, Vec<PageDescriptor>)> {
        let mut descriptors = descriptors.into_iter();
        let first = descriptors
            .next()
            .ok_or_else(|| Error::NoImagesFound(self.source_path.clone()))?;

        let keep = |d: &PageDescriptor| !(self.remove_blank_pages && d.is_blank);

        if self.has_cover {
            let pages: Vec<_> = descriptors.filter(|d| keep(d)).collect();
            return Ok((first, pages));
        }

        let mut pages: Vec<_> = std::iter::once(first.clone())
            .chain(descriptors)
            .filter(|d| keep(d))
            .collect();
        let cover = match pages.first_mut() {
            Some(page) => {
                let mut cover = page.clone();
                page.raw = None;
                cover.raw = cover.raw.or(first.raw);
                cover
            }
            None => first,
        };
        Ok((cover, pages))
    }

    /// Resolves (and creates, if configured) the directory bundles go to.
    async fn prepare_target(&self) -> Result<PathBuf> {
        if self.create_output_directory {
            let path = self
                .target_path
                .join(sanitize_filename(&self.metadata.title));
            if !path.exists() {
                fs::create_dir_all(&path).await?;
            }
            Ok(path)
        } else {
            if !self.target_path.is_dir() {
                return Err(Error::NotFound(format!(
                    "Target directory does not exist: {:?}",
                    self.target_path
                )));
            }
            Ok(self.target_path.clone())
        }
    }
}

impl KiritoriConfigBuilder {
    /// Validates the configuration before building.
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(quality) = self.image_quality {
            if !(1..=100).contains(&quality) {
                return Err("Image quality must be between 1 and 100.".to_string());
            }
        }
        if let Some(brightness) = self.brightness {
            if !(-100..=100).contains(&brightness) {
                return Err("Brightness must be between -100 and 100.".to_string());
            }
        }
        if let Some(contrast) = self.contrast {
            if !(-100..=100).contains(&contrast) {
                return Err("Contrast must be between -100 and 100.".to_string());
            }
        }
        if let Some(crop) = &self.crop {
            let ratios = [
                crop.ratio_left,
                crop.ratio_up,
                crop.ratio_right,
                crop.ratio_bottom,
            ];
            if ratios.iter().any(|ratio| *ratio > 100) {
                return Err("Crop ratios must be between 0 and 100.".to_string());
            }
            if crop.limit > 100 {
                return Err("Crop limit must be between 0 and 100.".to_string());
            }
        }
        if let Some(limit_mb) = self.limit_mb {
            if limit_mb != 0 && limit_mb < MIN_LIMIT_MB {
                return Err(format!(
                    "Size limit must be 0 (unlimited) or at least {} MB.",
                    MIN_LIMIT_MB
                ));
            }
        }
        if self.view_width == Some(0) || self.view_height == Some(0) {
            return Err("View width and height must be non-zero.".to_string());
        }
        if self.workers == Some(0) {
            return Err("At least one worker is required.".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> KiritoriConfigBuilder {
        let mut builder = KiritoriConfig::builder();
        builder
            .source_path(PathBuf::from("./source"))
            .target_path(PathBuf::from("./output"));
        builder
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.image_quality, 85);
        assert_eq!((config.view_width, config.view_height), (1072, 1448));
        assert!(config.crop.enabled);
        assert_eq!(config.crop.ratio_left, 1);
        assert!(config.auto_contrast);
        assert!(!config.auto_rotate);
        assert!(!config.auto_split_double_page);
        assert!(config.keep_double_page_if_split);
        assert!(config.has_cover);
        assert!(config.remove_blank_pages);
        assert_eq!(config.sort_path_mode, SortPathMode::Directories);
        assert_eq!(config.limit_mb, 0);
        assert!(config.workers >= 1);
        assert_eq!(config.budget_bytes(), 0);
    }

    #[test]
    fn test_builder_rejects_out_of_range_values() {
        assert!(builder().image_quality(0u8).build().is_err());
        assert!(builder().brightness(101).build().is_err());
        assert!(builder().contrast(-101).build().is_err());
        assert!(builder().limit_mb(5u32).build().is_err());
        assert!(builder().view_width(0u32).build().is_err());
        assert!(builder().workers(0usize).build().is_err());
        let crop = CropOptions {
            ratio_up: 150,
            ..CropOptions::default()
        };
        assert!(builder().crop(crop).build().is_err());

        assert!(builder().limit_mb(20u32).build().is_ok());
        assert!(builder().limit_mb(0u32).build().is_ok());
    }

    #[test]
    fn test_transform_options_follow_config() {
        let config = builder()
            .grayscale(false)
            .reading_direction(Direction::Rtl)
            .image_encoding(ImageEncoding::Png)
            .build()
            .unwrap();
        let options = config.transform_options();
        assert_eq!(options.grayscale, None);
        assert_eq!(options.direction, Direction::Rtl);
        assert_eq!(options.encoding, ImageEncoding::Png);
        assert_eq!(config.source_options().sort_mode, SortPathMode::Directories);
    }

    #[test]
    fn test_preflight_rejects_missing_source() {
        let config = builder()
            .source_path(PathBuf::from("./definitely/not/here.cbz"))
            .build()
            .unwrap();
        assert!(matches!(config.preflight_check(), Err(Error::NotFound(_))));
    }

    fn descriptor(id: usize, blank: bool) -> PageDescriptor {
        PageDescriptor {
            id,
            part: 0,
            width: 10,
            height: 10,
            is_double_page: false,
            is_blank: blank,
            raw: None,
            original_aspect_ratio: 1.0,
            error: None,
            path: String::new(),
            name: format!("{}.jpg", id),
            extension: "jpg",
            size: 10,
        }
    }

    #[test]
    fn test_arrange_separates_cover_and_drops_blanks() {
        let config = builder().build().unwrap();
        let descriptors = vec![descriptor(0, false), descriptor(1, true), descriptor(2, false)];
        let (cover, pages) = config.arrange(descriptors).unwrap();
        assert_eq!(cover.id, 0);
        let ids: Vec<usize> = pages.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2]);

        let config = builder().remove_blank_pages(false).has_cover(false).build().unwrap();
        let descriptors = vec![descriptor(0, false), descriptor(1, true)];
        let (cover, pages) = config.arrange(descriptors).unwrap();
        assert_eq!(cover.id, 0);
        assert_eq!(pages.len(), 2);
    }
}
