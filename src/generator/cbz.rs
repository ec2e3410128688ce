use chrono::prelude::*;

use crate::error::Result;
use crate::generator::{ManifestRenderer, PartManifest, escape_xml, fill_template};
use crate::types::{Direction, TITLE_PAGE_KEY};

/// A renderer for CBZ (Comic Book ZIP) bundles.
///
/// Images are renamed to their position in the book (`0000.jpg`, `0001.jpg`,
/// ...) so readers that sort by file name show them in order. The only
/// document is `ComicInfo.xml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cbz;

struct Slot {
    key: String,
    kind: Option<&'static str>,
    width: u32,
    height: u32,
    size: u64,
    double_page: bool,
}

fn slots(manifest: &PartManifest) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(manifest.pages.len() + 2);
    let cover_in_pages = manifest.cover_in_pages();

    if !cover_in_pages {
        slots.push(Slot {
            key: manifest.cover.key(),
            kind: Some("FrontCover"),
            width: manifest.cover.width,
            height: manifest.cover.height,
            size: manifest.cover.size,
            double_page: false,
        });
    }
    if let Some(title_page) = manifest.title_page {
        slots.push(Slot {
            key: TITLE_PAGE_KEY.to_string(),
            kind: Some("InnerCover"),
            width: title_page.width,
            height: title_page.height,
            size: title_page.size,
            double_page: false,
        });
    }
    for (index, page) in manifest.pages.iter().enumerate() {
        slots.push(Slot {
            key: page.key(),
            kind: (cover_in_pages && index == 0).then_some("FrontCover"),
            width: page.width,
            height: page.height,
            size: page.size,
            double_page: page.is_double_page,
        });
    }
    slots
}

fn target_name(position: usize, key: &str) -> String {
    let extension = key.rsplit('.').next().unwrap_or("jpg");
    format!("{:04}.{}", position, extension)
}

impl ManifestRenderer for Cbz {
    fn extension(&self) -> &'static str {
        "cbz"
    }

    fn image_targets(&self, manifest: &PartManifest) -> Vec<(String, String)> {
        slots(manifest)
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                let target = target_name(position, &slot.key);
                (slot.key, target)
            })
            .collect()
    }

    fn render(&self, manifest: &PartManifest) -> Result<Vec<(String, Vec<u8>)>> {
        const TEMPLATE: &str = include_str!("../../templates/ComicInfo.xml");
        let metadata = manifest.metadata;
        let slots = slots(manifest);

        let pages_xml = slots
            .iter()
            .enumerate()
            .map(|(position, slot)| {
                let mut attributes = format!("Image=\"{}\"", position);
                if let Some(kind) = slot.kind {
                    attributes.push_str(&format!(" Type=\"{}\"", kind));
                }
                if slot.double_page {
                    attributes.push_str(" DoublePage=\"true\"");
                }
                format!(
                    "    <Page {} ImageSize=\"{}\" ImageWidth=\"{}\" ImageHeight=\"{}\"/>",
                    attributes, slot.size, slot.width, slot.height
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let release_date = metadata.release_date.unwrap_or_else(Utc::now);
        let manga = match manifest.direction {
            Direction::Rtl => "YesAndRightToLeft",
            Direction::Ltr => "No",
        };

        let xml = fill_template(
            TEMPLATE,
            &[
                ("title", escape_xml(&manifest.title)),
                (
                    "series",
                    escape_xml(metadata.series.as_deref().unwrap_or(&metadata.title)),
                ),
                ("number", manifest.part_number.to_string()),
                ("count", manifest.part_count.to_string()),
                (
                    "description",
                    escape_xml(metadata.description.as_deref().unwrap_or("")),
                ),
                ("year", release_date.year().to_string()),
                ("month", release_date.month().to_string()),
                ("day", release_date.day().to_string()),
                ("writer", escape_xml(&metadata.authors.join(", "))),
                (
                    "publisher",
                    escape_xml(metadata.publisher.as_deref().unwrap_or("")),
                ),
                ("tags", escape_xml(&metadata.tags.join(", "))),
                ("language", escape_xml(&metadata.language)),
                (
                    "identifier",
                    escape_xml(metadata.identifier.as_deref().unwrap_or("")),
                ),
                ("pagecount", slots.len().to_string()),
                ("manga", manga.to_string()),
                ("pages", pages_xml),
            ],
        );

        Ok(vec![("ComicInfo.xml".to_string(), xml.into_bytes())])
    }
}
