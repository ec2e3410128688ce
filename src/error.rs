//! Custom error types and result handling for Kiritori operations.
//!
//! Fatal failures (unreadable containers, empty sources, store I/O) travel as
//! [`Error`] through a [`Result<T>`]. A single page that cannot be read or
//! decoded is *not* an [`Error`]: it is recorded as a [`PageError`] on the
//! resulting descriptor and a placeholder page takes its place.
//!
use std::path::PathBuf;

/// Type alias for Results with Kiritori errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all fatal Kiritori operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Image processing errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// ZIP file operation errors (CBZ sources, the image store, output bundles)
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// RAR archive errors
    #[error(transparent)]
    Rar(#[from] unrar::error::UnrarError),
    /// PDF parsing errors
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
    /// Directory traversal errors
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    KiritoriBuilder(#[from] crate::kiritori::KiritoriConfigBuilderError),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// The container was readable but held no supported image
    #[error("No images found in {0:?}")]
    NoImagesFound(PathBuf),
    /// The source is neither a directory nor a known container extension
    #[error("Unsupported container: {0}")]
    UnsupportedContainer(String),
    /// The temporary image store could not be written or read back
    #[error("Image store failure: {0}")]
    Store(String),
    /// Error for failed asynchronous tasks
    #[error("Asynchronous task failed: {0}")]
    AsyncTaskError(String),
    /// Error for resources that couldn't be found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

/// Recoverable failure attached to a single page.
///
/// The pipeline never returns this as an `Err`; it substitutes a placeholder
/// raster and keeps the reason on the descriptor for the caller to report.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The entry bytes could not be read from the container
    #[error("cannot read {name}: {reason}")]
    Read { name: String, reason: String },
    /// The bytes were read but are not a decodable image
    #[error("cannot decode {name}: {reason}")]
    Decode { name: String, reason: String },
    /// A PDF page without any extractable raster
    #[error("no image on {name}")]
    NoRaster { name: String },
}

impl PageError {
    /// Name of the offending source entry.
    pub fn name(&self) -> &str {
        match self {
            PageError::Read { name, .. }
            | PageError::Decode { name, .. }
            | PageError::NoRaster { name } => name,
        }
    }
}
