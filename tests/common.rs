//! Common test utilities and constants for the Kiritori crate.
//!
//! Provides functions for setting up test directories, creating image
//! sources (loose files, CBZ and PDF containers) and reading bundles back.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use kiritori::error::{Error, Result};
use rand::{Rng, distributions::Alphanumeric};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120);

#[allow(dead_code)]
pub const PORTRAIT: (u32, u32) = (100, 150);
#[allow(dead_code)]
pub const LANDSCAPE: (u32, u32) = (200, 150);

/// Checked-in RAR fixtures. Both hold the same four stored members, in this
/// order: `p10.png` (blue), `notes.txt`, `p2.png` (green), `p1.png` (red).
/// `solid.cbr` carries the solid archive flag, `stored.cbr` does not.
#[allow(dead_code)]
pub const FIXTURES_DIR: &str = "tests/fixtures";

/// CRC-32 of the RAR fixture pages in natural order: p1, p2, p10.
#[allow(dead_code)]
pub const RAR_PAGE_CRCS: [u32; 3] = [0xf2e4_debc, 0x7e84_a98e, 0xdc35_4da1];

#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(FIXTURES_DIR).join(name)
}

/// CRC-32 of a byte buffer, as stored in zip and rar headers.
#[allow(dead_code)]
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(bytes);
    crc.sum()
}

pub struct TestDirs {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
}

/// Creates a unique test directory with `source` and `target` subdirectories.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).await.unwrap();
    }
    let source_dir = test_dir.join("source");
    let target_dir = test_dir.join("target");

    fs::create_dir_all(&source_dir).await.unwrap();
    fs::create_dir_all(&target_dir).await.unwrap();

    TestDirs {
        source_dir,
        target_dir,
    }
}

/// A solid-colour page. Saturated colours are far from the blank threshold.
#[allow(dead_code)]
pub fn solid_page((width, height): (u32, u32), color: Rgb<u8>) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, color))
}

#[allow(dead_code)]
pub fn jpeg_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// Writes a JPEG page to `path`, creating parent directories.
#[allow(dead_code)]
pub async fn create_page(path: &Path, size: (u32, u32), color: Rgb<u8>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = jpeg_bytes(&solid_page(size, color));
    fs::write(path, bytes).await?;
    Ok(())
}

/// Writes a CBZ with the given `(member, bytes)` entries, in that order.
#[allow(dead_code)]
pub fn create_cbz(path: &Path, members: &[(&str, Vec<u8>)]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, bytes) in members {
        zip.start_file(*name, options)?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(())
}

/// Writes a PDF whose pages each show one image XObject.
///
/// JPEG pages are embedded as `DCTDecode` streams; raw pages as deflated
/// `DeviceRGB` samples.
#[allow(dead_code)]
pub fn create_pdf(path: &Path, pages: &[DynamicImage], raw: bool) -> Result<()> {
    use lopdf::{Document, Object, Stream, dictionary};

    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for page in pages {
        let (width, height) = (page.width() as i64, page.height() as i64);
        let image = if raw {
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(page.to_rgb8().as_raw())?;
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                encoder.finish()?,
            )
        } else {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg_bytes(page),
            )
        };
        let image_id = document.add_object(image);
        let content = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", width, height);
        let content_id = document.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);
    document
        .save(path)
        .map_err(|e| Error::Other(format!("Failed to save test PDF: {}", e)))?;
    Ok(())
}

/// Entry names of a ZIP bundle in archive order.
#[allow(dead_code)]
pub fn zip_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|index| archive.by_index_raw(index).unwrap().name().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn read_zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

/// Reads the ComicInfo.xml from a CBZ file and returns its content.
#[allow(dead_code)]
pub fn get_comic_info_xml(cbz_path: &Path) -> String {
    String::from_utf8(read_zip_entry(cbz_path, "ComicInfo.xml")).unwrap()
}

/// Files directly inside `dir`, sorted by name.
#[allow(dead_code)]
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
