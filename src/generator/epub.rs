//! EPUB 3 manifests: fixed-layout, one XHTML document per image.

use chrono::Utc;

use crate::error::Result;
use crate::generator::{ManifestRenderer, PartManifest, escape_xml, fill_template};
use crate::types::{TITLE_PAGE_KEY, mime_for_extension};

const CONTAINER: &str = include_str!("../../templates/container.xml");
const PACKAGE: &str = include_str!("../../templates/content.opf");
const NAV: &str = include_str!("../../templates/nav.xhtml");
const PAGE: &str = include_str!("../../templates/page.xhtml");
const STYLE: &str = include_str!("../../templates/style.css");

/// EPUB 3 renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Epub;

/// One image document of the book, in reading order.
struct Spread {
    /// Document stem, also the manifest id suffix.
    stem: String,
    key: String,
    title: String,
    width: u32,
    height: u32,
    is_cover: bool,
}

impl Spread {
    fn document(&self) -> String {
        format!("text/{}.xhtml", self.stem)
    }

    fn image_id(&self) -> String {
        if self.is_cover {
            "cover-image".to_string()
        } else {
            format!("img-{}", self.stem)
        }
    }
}

fn spreads(manifest: &PartManifest) -> Vec<Spread> {
    let mut spreads = Vec::with_capacity(manifest.pages.len() + 2);
    let cover_in_pages = manifest.cover_in_pages();

    if !cover_in_pages {
        spreads.push(Spread {
            stem: "cover".to_string(),
            key: manifest.cover.key(),
            title: "Cover".to_string(),
            width: manifest.cover.width,
            height: manifest.cover.height,
            is_cover: true,
        });
    }
    if let Some(title_page) = manifest.title_page {
        spreads.push(Spread {
            stem: "title".to_string(),
            key: TITLE_PAGE_KEY.to_string(),
            title: manifest.title.clone(),
            width: title_page.width,
            height: title_page.height,
            is_cover: false,
        });
    }
    for (index, page) in manifest.pages.iter().enumerate() {
        spreads.push(Spread {
            stem: format!("{:05}_{}", page.id, page.part),
            key: page.key(),
            title: format!("Page {}", index + 1),
            width: page.width,
            height: page.height,
            is_cover: cover_in_pages && index == 0,
        });
    }
    spreads
}

fn identifier(manifest: &PartManifest) -> String {
    let base = manifest.metadata.identifier.clone().unwrap_or_else(|| {
        let slug: String = manifest
            .metadata
            .title
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("urn:kiritori:{}", slug)
    });
    if manifest.part_count > 1 {
        format!("{}:part-{}", base, manifest.part_number)
    } else {
        base
    }
}

fn optional_metadata(manifest: &PartManifest) -> String {
    let metadata = manifest.metadata;
    let mut lines = Vec::new();

    for author in &metadata.authors {
        lines.push(format!("    <dc:creator>{}</dc:creator>", escape_xml(author)));
    }
    if let Some(publisher) = &metadata.publisher {
        lines.push(format!("    <dc:publisher>{}</dc:publisher>", escape_xml(publisher)));
    }
    if let Some(description) = &metadata.description {
        lines.push(format!(
            "    <dc:description>{}</dc:description>",
            escape_xml(description)
        ));
    }
    for tag in &metadata.tags {
        lines.push(format!("    <dc:subject>{}</dc:subject>", escape_xml(tag)));
    }
    if let Some(release_date) = &metadata.release_date {
        lines.push(format!(
            "    <dc:date>{}</dc:date>",
            release_date.format("%Y-%m-%d")
        ));
    }
    if let Some(series) = &metadata.series {
        lines.push(format!(
            "    <meta property=\"belongs-to-collection\" id=\"series\">{}</meta>",
            escape_xml(series)
        ));
        lines.push("    <meta refines=\"#series\" property=\"collection-type\">series</meta>".to_string());
        lines.push(format!(
            "    <meta refines=\"#series\" property=\"group-position\">{}</meta>",
            manifest.part_number
        ));
    }
    lines.join("\n")
}

fn package_document(manifest: &PartManifest, spreads: &[Spread]) -> String {
    let mut items = Vec::with_capacity(spreads.len() * 2);
    let mut itemrefs = Vec::with_capacity(spreads.len());

    for spread in spreads {
        let extension = spread.key.rsplit('.').next().unwrap_or("jpg");
        let properties = if spread.is_cover {
            " properties=\"cover-image\""
        } else {
            ""
        };
        items.push(format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>",
            spread.image_id(),
            spread.key,
            mime_for_extension(extension),
            properties
        ));
        items.push(format!(
            "    <item id=\"page-{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>",
            spread.stem,
            spread.document()
        ));
        itemrefs.push(format!("    <itemref idref=\"page-{}\"/>", spread.stem));
    }

    fill_template(
        PACKAGE,
        &[
            ("identifier", escape_xml(&identifier(manifest))),
            ("title", escape_xml(&manifest.title)),
            ("language", escape_xml(&manifest.metadata.language)),
            ("metadata", optional_metadata(manifest)),
            (
                "modified",
                Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ),
            ("manifest", items.join("\n")),
            ("direction", manifest.direction.to_string()),
            ("spine", itemrefs.join("\n")),
        ],
    )
}

fn page_document(spread: &Spread) -> String {
    fill_template(
        PAGE,
        &[
            ("title", escape_xml(&spread.title)),
            ("alt", escape_xml(&spread.title)),
            ("src", format!("../{}", spread.key)),
            ("width", spread.width.to_string()),
            ("height", spread.height.to_string()),
        ],
    )
}

impl ManifestRenderer for Epub {
    fn extension(&self) -> &'static str {
        "epub"
    }

    fn magic(&self) -> Option<(&'static str, &'static [u8])> {
        Some(("mimetype", b"application/epub+zip"))
    }

    fn image_targets(&self, manifest: &PartManifest) -> Vec<(String, String)> {
        spreads(manifest)
            .into_iter()
            .map(|spread| {
                let target = format!("OEBPS/{}", spread.key);
                (spread.key, target)
            })
            .collect()
    }

    fn render(&self, manifest: &PartManifest) -> Result<Vec<(String, Vec<u8>)>> {
        let spreads = spreads(manifest);
        let start = spreads
            .first()
            .map(|spread| spread.document())
            .unwrap_or_default();

        let mut documents = vec![
            ("META-INF/container.xml".to_string(), CONTAINER.as_bytes().to_vec()),
            (
                "OEBPS/content.opf".to_string(),
                package_document(manifest, &spreads).into_bytes(),
            ),
            (
                "OEBPS/nav.xhtml".to_string(),
                fill_template(
                    NAV,
                    &[
                        ("title", escape_xml(&manifest.title)),
                        ("language", escape_xml(&manifest.metadata.language)),
                        ("start", start),
                    ],
                )
                .into_bytes(),
            ),
            ("OEBPS/style.css".to_string(), STYLE.as_bytes().to_vec()),
        ];
        documents.extend(spreads.iter().map(|spread| {
            (
                format!("OEBPS/{}", spread.document()),
                page_document(spread).into_bytes(),
            )
        }));
        Ok(documents)
    }
}
