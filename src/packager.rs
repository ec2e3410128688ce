//! Size-aware packaging.
//!
//! [`plan_parts`] splits the sorted page run into parts that each fit a byte
//! budget; [`Packager`] writes one bundle per part, repeating the cover (and
//! title page) at the start of every part.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;
use crate::generator::{Bundle, ManifestRenderer, PartManifest};
use crate::path_utils::sanitize_filename;
use crate::store::StoreReader;
use crate::types::{Direction, EbookMetadata, PageDescriptor, Part, TitlePage};

/// Fixed cost of a bundle: manifests, zip directory, stylesheet.
pub const BASE_OVERHEAD: u64 = 128 * 1024;
/// Per-page cost on top of the image: its documents and zip headers.
pub const PAGE_OVERHEAD: u64 = 1024;

/// Greedy, order-preserving split of `pages` into parts of at most `budget`
/// bytes. `seed` is the size every part starts with on top of
/// [`BASE_OVERHEAD`] (the replicated cover and title page).
///
/// A budget of 0 yields exactly one part. A part is closed only once it holds
/// a page, so a page that alone exceeds the budget becomes its own part.
pub fn plan_parts(cover: &PageDescriptor, pages: Vec<PageDescriptor>, budget: u64, seed: u64) -> Vec<Part> {
    if budget == 0 {
        return vec![Part {
            cover: cover.clone(),
            pages,
        }];
    }

    let start = BASE_OVERHEAD + seed;
    let mut parts = Vec::new();
    let mut current: Vec<PageDescriptor> = Vec::new();
    let mut current_size = start;

    for page in pages {
        let cost = page.size + PAGE_OVERHEAD;
        if current_size + cost > budget && !current.is_empty() {
            parts.push(Part {
                cover: cover.clone(),
                pages: std::mem::take(&mut current),
            });
            current_size = start;
        }
        current_size += cost;
        current.push(page);
    }

    if !current.is_empty() || parts.is_empty() {
        parts.push(Part {
            cover: cover.clone(),
            pages: current,
        });
    }
    parts
}

/// `Title`, or `Title Part 02 of 03` when the book spans several parts.
pub fn part_title(title: &str, part_number: usize, part_count: usize) -> String {
    if part_count > 1 {
        format!("{} Part {:02} of {:02}", title, part_number, part_count)
    } else {
        title.to_string()
    }
}

/// Writes planned parts as bundles into a target directory.
pub struct Packager<'a> {
    renderer: &'a dyn ManifestRenderer,
    metadata: &'a EbookMetadata,
    direction: Direction,
    target_directory: &'a Path,
}

impl<'a> Packager<'a> {
    pub fn new(
        renderer: &'a dyn ManifestRenderer,
        metadata: &'a EbookMetadata,
        direction: Direction,
        target_directory: &'a Path,
    ) -> Self {
        Self {
            renderer,
            metadata,
            direction,
            target_directory,
        }
    }

    /// Writes one bundle per part and returns their paths, in part order.
    pub fn write(
        &self,
        parts: &[Part],
        title_page: Option<TitlePage>,
        store: &mut StoreReader,
    ) -> Result<Vec<PathBuf>> {
        let part_count = parts.len();
        let mut bundles = Vec::with_capacity(part_count);

        for (index, part) in parts.iter().enumerate() {
            let manifest = PartManifest {
                metadata: self.metadata,
                title: part_title(&self.metadata.title, index + 1, part_count),
                part_number: index + 1,
                part_count,
                direction: self.direction,
                cover: &part.cover,
                title_page,
                pages: &part.pages,
            };
            bundles.push(self.write_part(&manifest, store)?);
        }
        Ok(bundles)
    }

    fn write_part(&self, manifest: &PartManifest, store: &mut StoreReader) -> Result<PathBuf> {
        let file_name = format!(
            "{}.{}",
            sanitize_filename(&manifest.title),
            self.renderer.extension()
        );
        let path = self.target_directory.join(file_name);
        debug!("Writing part {}/{} to {:?}", manifest.part_number, manifest.part_count, path);

        let mut bundle = Bundle::create(&path, self.renderer)?;
        for (name, content) in self.renderer.render(manifest)? {
            bundle.add_document(&name, &content)?;
        }
        for (key, target) in self.renderer.image_targets(manifest) {
            bundle.copy_asset(store, &key, &target)?;
        }
        let path = bundle.save()?;

        info!(
            "Wrote {:?} ({} page(s))",
            path,
            manifest.pages.len()
        );
        Ok(path)
    }
}
