//! PDF documents, one entry per page.
//!
//! Only embedded rasters are extracted: for each page the largest image
//! XObject (searched through nested form XObjects) becomes the page. JPEG
//! streams are passed through as encoded bytes; Flate or uncompressed samples
//! are rebuilt into a raster from their colour space.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{PageError, Result};
use crate::source::{PageLoader, RawPage, SourceOptions, read_error, unexpected_locator};
use crate::types::{EntryLocator, PageEntry};

pub struct PdfLoader {
    document: Document,
}

impl PdfLoader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            document: Document::load(path)?,
        })
    }

    /// Image streams reachable from a page, largest first.
    fn page_images(&self, page_id: ObjectId) -> Vec<&Stream> {
        let mut images = Vec::new();
        let mut seen = HashSet::new();

        if let Some(resources) = page_resources(&self.document, page_id) {
            collect_images(&self.document, resources, &mut images, &mut seen);
        }

        images.sort_by_key(|stream| {
            let (width, height) = stream_dimensions(stream);
            std::cmp::Reverse(width as u64 * height as u64)
        });
        images
    }
}

impl PageLoader for PdfLoader {
    fn list(&self, _options: &SourceOptions) -> Result<Vec<PageEntry>> {
        // Pages keep document order; natural sorting does not apply.
        Ok(self
            .document
            .get_pages()
            .keys()
            .enumerate()
            .map(|(id, &number)| PageEntry {
                id,
                path: String::new(),
                name: format!("page_{:04}", number),
                locator: EntryLocator::PdfPage(number),
            })
            .collect())
    }

    fn open(&self, entry: &PageEntry) -> std::result::Result<RawPage, PageError> {
        let EntryLocator::PdfPage(number) = entry.locator else {
            return Err(unexpected_locator(entry));
        };
        let page_id = *self
            .document
            .get_pages()
            .get(&number)
            .ok_or_else(|| read_error(entry, "page missing from page tree"))?;

        let stream = self
            .page_images(page_id)
            .into_iter()
            .next()
            .ok_or_else(|| PageError::NoRaster {
                name: entry.display_name(),
            })?;

        extract_raster(&self.document, stream).map_err(|reason| PageError::Decode {
            name: entry.display_name(),
            reason,
        })
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn as_dictionary<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

fn name_of(object: &Object) -> Option<String> {
    match object {
        Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
        Object::Array(items) => items.first().and_then(name_of),
        _ => None,
    }
}

fn integer_of(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key).ok()? {
        Object::Integer(value) if *value > 0 => u32::try_from(*value).ok(),
        _ => None,
    }
}

fn stream_dimensions(stream: &Stream) -> (u32, u32) {
    (
        integer_of(&stream.dict, b"Width").unwrap_or(0),
        integer_of(&stream.dict, b"Height").unwrap_or(0),
    )
}

/// Page resources, inherited from the page tree when the page has none.
fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = document.get_object(page_id).ok()?;
    loop {
        let dict = as_dictionary(document, node)?;
        if let Ok(resources) = dict.get(b"Resources") {
            return as_dictionary(document, resources);
        }
        node = dict.get(b"Parent").ok()?;
    }
}

fn collect_images<'a>(
    document: &'a Document,
    resources: &'a Dictionary,
    images: &mut Vec<&'a Stream>,
    seen: &mut HashSet<ObjectId>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| as_dictionary(document, x))
    else {
        return;
    };

    for (_, value) in xobjects.iter() {
        if let Object::Reference(id) = value {
            if !seen.insert(*id) {
                continue;
            }
        }
        let Some(Object::Stream(stream)) = resolve(document, value) else {
            continue;
        };
        match stream.dict.get(b"Subtype").ok().and_then(name_of).as_deref() {
            Some("Image") => images.push(stream),
            Some("Form") => {
                if let Some(nested) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| as_dictionary(document, r))
                {
                    collect_images(document, nested, images, seen);
                }
            }
            _ => {}
        }
    }
}

fn filters(stream: &Stream) -> Vec<String> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).to_string()],
        Ok(Object::Array(items)) => items.iter().filter_map(name_of).collect(),
        _ => Vec::new(),
    }
}

fn extract_raster(document: &Document, stream: &Stream) -> std::result::Result<RawPage, String> {
    let mut data = stream.content.clone();

    for filter in filters(stream) {
        match filter.as_str() {
            "FlateDecode" => {
                let mut decoded = Vec::new();
                ZlibDecoder::new(&data[..])
                    .read_to_end(&mut decoded)
                    .map_err(|e| format!("inflate failed: {}", e))?;
                data = decoded;
            }
            // Complete image files: let the pipeline decode them.
            "DCTDecode" | "JPXDecode" => return Ok(RawPage::Encoded(data)),
            other => return Err(format!("unsupported filter {}", other)),
        }
    }

    let (width, height) = stream_dimensions(stream);
    if width == 0 || height == 0 {
        return Err("invalid image dimensions".to_string());
    }
    let bits = integer_of(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(format!("unsupported {} bits per component", bits));
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|cs| resolve(document, cs))
        .and_then(name_of)
        .unwrap_or_else(|| "DeviceRGB".to_string());

    samples_to_raster(&data, width, height, &color_space).map(RawPage::Decoded)
}

fn samples_to_raster(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &str,
) -> std::result::Result<DynamicImage, String> {
    let pixels = width as usize * height as usize;
    let channels = match color_space {
        "DeviceGray" | "CalGray" => 1,
        "DeviceCMYK" => 4,
        "DeviceRGB" | "CalRGB" => 3,
        // ICC profiles carry their component count elsewhere; infer from the data.
        "ICCBased" if data.len() >= pixels * 3 => 3,
        "ICCBased" if data.len() >= pixels => 1,
        other => return Err(format!("unsupported colour space {}", other)),
    };
    if data.len() < pixels * channels {
        return Err(format!(
            "truncated samples: {} bytes, expected {}",
            data.len(),
            pixels * channels
        ));
    }

    let samples = &data[..pixels * channels];
    match channels {
        1 => GrayImage::from_raw(width, height, samples.to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "grayscale buffer mismatch".to_string()),
        3 => RgbImage::from_raw(width, height, samples.to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "RGB buffer mismatch".to_string()),
        _ => {
            let rgb: Vec<u8> = samples
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - cmyk[3] as u32;
                    [
                        ((255 - cmyk[0] as u32) * k / 255) as u8,
                        ((255 - cmyk[1] as u32) * k / 255) as u8,
                        ((255 - cmyk[2] as u32) * k / 255) as u8,
                    ]
                })
                .collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "CMYK buffer mismatch".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmyk_samples_convert_to_rgb() {
        let data = [0, 0, 0, 0, 255, 255, 255, 0, 0, 0, 0, 255, 0, 255, 255, 0];
        let image = samples_to_raster(&data, 2, 2, "DeviceCMYK").unwrap().to_rgb8();
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(0, 1).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(1, 1).0, [255, 0, 0]);
    }

    #[test]
    fn test_truncated_samples_are_rejected() {
        assert!(samples_to_raster(&[0; 5], 2, 2, "DeviceRGB").is_err());
        assert!(samples_to_raster(&[0; 4], 2, 2, "Indexed").is_err());
    }
}
