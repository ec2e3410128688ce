//! Kiritori - Comic Archive to Ebook Conversion Library
//!
//! This crate turns comic and manga sources (image folders, CBZ/ZIP, CBR/RAR
//! and PDF files) into device-fitted EPUB or CBZ bundles. Pages are listed in
//! natural order, cropped, contrast-corrected, split, resized and re-encoded on
//! a worker pool, then packaged into one or more bundles that each stay under
//! a size budget.
//!
//! # Getting Started
//!
//! Describe the conversion with an `EbookMetadata` and a `KiritoriConfig` built
//! through its builder, then run it with [`KiritoriConfig::convert`].
//!
//! ```rust,no_run
//! use kiritori::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> kiritori::error::Result<()> {
//!     // 1. Define the metadata for your ebook
//!     let metadata = EbookMetadata {
//!         title: "My Awesome Series".to_string(),
//!         authors: vec!["Jane Doe".to_string()],
//!         ..EbookMetadata::default_with_title(String::new())
//!     };
//!
//!     // 2. Configure your conversion task using the builder
//!     let config = KiritoriConfig::builder()
//!         .metadata(metadata)
//!         .source_path(PathBuf::from("./my_manga/volume_01.cbr"))
//!         .target_path(PathBuf::from("./converted_ebooks"))
//!         .output_format(FileFormat::Epub)
//!         .reading_direction(Direction::Rtl)
//!         .auto_split_double_page(true)
//!         .limit_mb(200u32)
//!         .build()?;
//!
//!     // 3. Execute the full conversion pipeline
//!     let report = config.convert().await?;
//!     println!("Wrote {} bundle(s)", report.bundles.len());
//!     for (page, error) in &report.page_errors {
//!         println!("Replaced {}: {}", page, error);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! The building blocks (source loaders, the transform pipeline, the worker
//! pool, the image store and the packager) are public too and can be driven
//! on their own.

pub mod error;
pub mod generator;
pub mod kiritori;
pub mod natsort;
pub mod packager;
pub mod path_utils;
pub mod pool;
pub mod source;
pub mod store;
pub mod transform;
pub mod types;

// Publicly expose the main `KiritoriConfig` struct and its builder
pub use kiritori::KiritoriConfig;
pub use kiritori::KiritoriConfigBuilder;

// Re-export error and core types for direct access
pub use types::{
    ContainerKind, ConversionReport, CropOptions, Direction, EbookMetadata, FileFormat,
    GrayscaleMode, ImageEncoding, PageDescriptor, PageEntry, Progress, SortPathMode,
};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types, allowing you to
/// import everything you need with a single `use kiritori::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        ContainerKind, ConversionReport, CropOptions, Direction, EbookMetadata, FileFormat,
        GrayscaleMode, ImageEncoding, KiritoriConfig, KiritoriConfigBuilder, PageDescriptor,
        PageEntry, Progress, SortPathMode,
    };
    pub use crate::error::{Error, PageError, Result};
    pub use crate::pool::ProgressCallback;
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
