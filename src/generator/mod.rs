//! Bundle generation: manifest collaborators and the bundle writer.
//!
//! A [`ManifestRenderer`] knows one output format. Given a [`PartManifest`]
//! it says where each stored image goes inside the bundle and renders the
//! text documents (OPF, XHTML, ComicInfo, ...) as opaque bytes. The
//! [`Bundle`] writer does not look inside those documents: it writes the
//! format's magic entry first, then the documents, then raw-copies the
//! images out of the image store.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::store::StoreReader;
use crate::types::{Direction, EbookMetadata, FileFormat, PageDescriptor, TitlePage};

pub mod cbz;
pub mod epub;

pub use cbz::Cbz;
pub use epub::Epub;

/// Everything a manifest collaborator gets to see of one part.
#[derive(Debug, Clone)]
pub struct PartManifest<'a> {
    pub metadata: &'a EbookMetadata,
    /// Display title of this part (`Title` or `Title Part 2 of 3`).
    pub title: String,
    /// 1-based.
    pub part_number: usize,
    pub part_count: usize,
    pub direction: Direction,
    pub cover: &'a PageDescriptor,
    pub title_page: Option<TitlePage>,
    pub pages: &'a [PageDescriptor],
}

impl PartManifest<'_> {
    /// True when the cover is also the first page of the run (books without a
    /// dedicated cover entry).
    pub fn cover_in_pages(&self) -> bool {
        self.pages
            .first()
            .is_some_and(|page| page.order_key() == self.cover.order_key())
    }
}

/// Format-specific manifest rendering.
pub trait ManifestRenderer: Send + Sync {
    /// File extension of the bundles, without the dot.
    fn extension(&self) -> &'static str;

    /// Entry that must come first, uncompressed (EPUB `mimetype`).
    fn magic(&self) -> Option<(&'static str, &'static [u8])> {
        None
    }

    /// `(store key, path inside the bundle)` for every image, in reading order.
    fn image_targets(&self, manifest: &PartManifest) -> Vec<(String, String)>;

    /// Text documents of the bundle as `(path, bytes)`.
    fn render(&self, manifest: &PartManifest) -> Result<Vec<(String, Vec<u8>)>>;
}

/// The renderer for an output format.
pub fn renderer_for(format: FileFormat) -> Box<dyn ManifestRenderer> {
    match format {
        FileFormat::Epub => Box::new(Epub),
        FileFormat::Cbz => Box::new(Cbz),
    }
}

/// A bundle file being written.
pub struct Bundle {
    zip: Option<ZipWriter<File>>,
    path: PathBuf,
    documents: SimpleFileOptions,
    written: HashSet<String>,
}

impl Bundle {
    /// Creates the bundle file and writes the renderer's magic entry, if any.
    pub fn create(path: &Path, renderer: &dyn ManifestRenderer) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create bundle '{}': {}", path.display(), e),
            ))
        })?;
        let mut zip = ZipWriter::new(file);

        let mut written = HashSet::new();
        if let Some((name, content)) = renderer.magic() {
            let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file(name, stored)?;
            zip.write_all(content)?;
            written.insert(name.to_string());
        }

        Ok(Self {
            zip: Some(zip),
            path: path.to_path_buf(),
            documents: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            written,
        })
    }

    fn zip(&mut self) -> Result<&mut ZipWriter<File>> {
        self.zip
            .as_mut()
            .ok_or_else(|| Error::Other("Zip writer not available".to_string()))
    }

    /// Adds a rendered text document, deflated.
    pub fn add_document(&mut self, name: &str, content: &[u8]) -> Result<&mut Self> {
        let options = self.documents;
        let zip = self.zip()?;
        zip.start_file(name, options)?;
        zip.write_all(content)?;
        self.written.insert(name.to_string());
        Ok(self)
    }

    /// Raw-copies a stored asset. A target that was already written is skipped.
    pub fn copy_asset(&mut self, store: &mut StoreReader, key: &str, target: &str) -> Result<&mut Self> {
        if self.written.contains(target) {
            return Ok(self);
        }
        store.copy_into(key, self.zip()?, target)?;
        self.written.insert(target.to_string());
        Ok(self)
    }

    /// Writes the central directory and returns the bundle path.
    pub fn save(mut self) -> Result<PathBuf> {
        let zip = self
            .zip
            .take()
            .ok_or_else(|| Error::Other("Zip writer not available".to_string()))?;
        zip.finish()?;
        Ok(self.path)
    }
}

/// Escapes the five XML special characters.
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Fills the `%name%` placeholders of a template in a single pass.
///
/// Substituted values are copied as-is and never scanned again; a `%` that
/// does not open a known placeholder is kept.
pub(crate) fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let known = after.find('%').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (end, value))
        });
        match known {
            Some((end, value)) => {
                output.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                output.push('%');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{EbookMetadata, PageDescriptor};

    pub(crate) fn page(id: usize, part: u8) -> PageDescriptor {
        PageDescriptor {
            id,
            part,
            width: 800,
            height: 1200,
            is_double_page: part == 0 && id == 2,
            is_blank: false,
            raw: None,
            original_aspect_ratio: 0.66,
            error: None,
            path: "ch1".to_string(),
            name: format!("{:03}.jpg", id),
            extension: "jpg",
            size: 1000,
        }
    }

    pub(crate) fn manifest<'a>(
        metadata: &'a EbookMetadata,
        cover: &'a PageDescriptor,
        pages: &'a [PageDescriptor],
    ) -> PartManifest<'a> {
        PartManifest {
            metadata,
            title: metadata.title.clone(),
            part_number: 1,
            part_count: 1,
            direction: Direction::Rtl,
            cover,
            title_page: None,
            pages,
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("Tom & \"Jerry\" <3"), "Tom &amp; &quot;Jerry&quot; &lt;3");
    }

    #[test]
    fn test_fill_template_is_single_pass() {
        let values = [
            ("title", "%body% 100%".to_string()),
            ("body", "pages".to_string()),
        ];
        assert_eq!(
            fill_template("<h1>%title%</h1>%body% %unknown% 50%", &values),
            "<h1>%body% 100%</h1>pages %unknown% 50%"
        );
    }

    #[test]
    fn test_cover_in_pages() {
        let metadata = EbookMetadata::default_with_title("Book".to_string());
        let cover = page(0, 0);
        let with_cover = [page(0, 0), page(1, 0)];
        let without_cover = [page(1, 0)];
        assert!(manifest(&metadata, &cover, &with_cover).cover_in_pages());
        assert!(!manifest(&metadata, &cover, &without_cover).cover_in_pages());
    }
}
