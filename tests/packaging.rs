//! Packaging tests: size-budgeted parts written from a filled image store.

use image::Rgb;
use kiritori::error::Result;
use kiritori::generator::renderer_for;
use kiritori::packager::{Packager, plan_parts};
use kiritori::prelude::*;
use kiritori::store::ImageStore;
use kiritori::types::{TITLE_PAGE_KEY, TitlePage};

mod common;
use common::{
    PORTRAIT, get_comic_info_xml, jpeg_bytes, list_files, read_zip_entry, setup_test_dirs,
    solid_page, zip_entries,
};

fn descriptor(id: usize, size: u64) -> PageDescriptor {
    PageDescriptor {
        id,
        part: 0,
        width: PORTRAIT.0,
        height: PORTRAIT.1,
        is_double_page: false,
        is_blank: false,
        raw: None,
        original_aspect_ratio: PORTRAIT.0 as f32 / PORTRAIT.1 as f32,
        error: None,
        path: String::new(),
        name: format!("{:03}.jpg", id),
        extension: "jpg",
        size,
    }
}

/// Fills a store with a cover, a title page and `count` pages, all sharing
/// the same JPEG bytes. Returns the store, the cover and the pages.
fn filled_store(
    directory: &Path,
    count: usize,
) -> Result<(ImageStore, PageDescriptor, Vec<PageDescriptor>, Vec<u8>)> {
    let bytes = jpeg_bytes(&solid_page(PORTRAIT, Rgb([0, 120, 200])));
    let store = ImageStore::create(directory)?;

    let cover = descriptor(0, store.add(&descriptor(0, 0).key(), &bytes)?);
    store.add(TITLE_PAGE_KEY, &bytes)?;
    let mut pages = Vec::with_capacity(count);
    for id in 1..=count {
        let mut page = descriptor(id, 0);
        page.size = store.add(&page.key(), &bytes)?;
        pages.push(page);
    }
    Ok((store, cover, pages, bytes))
}

#[tokio::test]
async fn test_budget_splits_into_numbered_cbz_parts() -> Result<()> {
    let test_dirs = setup_test_dirs("cbz_parts").await;
    let (store, cover, pages, bytes) = filled_store(&test_dirs.target_dir, 9)?;
    let title = TitlePage {
        width: PORTRAIT.0,
        height: PORTRAIT.1,
        size: bytes.len() as u64,
    };

    let page_cost = bytes.len() as u64 + kiritori::packager::PAGE_OVERHEAD;
    let seed = cover.size + title.size;
    // Room for exactly three pages per part.
    let budget = kiritori::packager::BASE_OVERHEAD + seed + 3 * page_cost;
    let parts = plan_parts(&cover, pages, budget, seed);
    assert_eq!(parts.len(), 3);

    let metadata = EbookMetadata {
        series: Some("Saga".to_string()),
        ..EbookMetadata::default_with_title("Big Book".to_string())
    };
    let mut reader = store.finish()?;
    let renderer = renderer_for(FileFormat::Cbz);
    let bundles = Packager::new(
        renderer.as_ref(),
        &metadata,
        Direction::Ltr,
        &test_dirs.target_dir,
    )
    .write(&parts, Some(title), &mut reader)?;
    drop(reader);

    assert_eq!(
        list_files(&test_dirs.target_dir),
        vec![
            "Big Book Part 01 of 03.cbz".to_string(),
            "Big Book Part 02 of 03.cbz".to_string(),
            "Big Book Part 03 of 03.cbz".to_string(),
        ]
    );

    for (index, bundle) in bundles.iter().enumerate() {
        // Cover and title page are repeated in every part.
        assert_eq!(
            zip_entries(bundle),
            vec!["ComicInfo.xml", "0000.jpg", "0001.jpg", "0002.jpg", "0003.jpg", "0004.jpg"]
        );
        assert_eq!(read_zip_entry(bundle, "0000.jpg"), bytes);

        let comic_info = get_comic_info_xml(bundle);
        assert!(comic_info.contains(&format!("<Number>{}</Number>", index + 1)));
        assert!(comic_info.contains("<Count>3</Count>"));
        assert!(comic_info.contains("<Series>Saga</Series>"));
        assert!(comic_info.contains("<PageCount>5</PageCount>"));
        assert!(comic_info.contains("<Page Image=\"1\" Type=\"InnerCover\""));
    }
    Ok(())
}

#[tokio::test]
async fn test_unlimited_budget_writes_a_single_epub() -> Result<()> {
    let test_dirs = setup_test_dirs("single_epub").await;
    let (store, cover, pages, _) = filled_store(&test_dirs.target_dir, 12)?;

    let parts = plan_parts(&cover, pages, 0, cover.size);
    assert_eq!(parts.len(), 1);

    let metadata = EbookMetadata::default_with_title("Whole".to_string());
    let mut reader = store.finish()?;
    assert_eq!(reader.len(), 14);
    let renderer = renderer_for(FileFormat::Epub);
    let bundles = Packager::new(
        renderer.as_ref(),
        &metadata,
        Direction::Rtl,
        &test_dirs.target_dir,
    )
    .write(&parts, None, &mut reader)?;

    assert_eq!(bundles, vec![test_dirs.target_dir.join("Whole.epub")]);
    let entries = zip_entries(&bundles[0]);
    assert_eq!(entries[0], "mimetype");
    let images = entries
        .iter()
        .filter(|name| name.starts_with("OEBPS/images/"))
        .count();
    assert_eq!(images, 13);
    assert!(!entries.contains(&"OEBPS/images/title.jpg".to_string()));

    let opf = String::from_utf8(read_zip_entry(&bundles[0], "OEBPS/content.opf")).unwrap();
    assert!(opf.contains("<dc:title>Whole</dc:title>"));
    assert!(opf.contains("page-progression-direction=\"rtl\""));
    Ok(())
}
