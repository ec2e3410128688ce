//! Per-page transform pipeline.
//!
//! [`Pipeline::process`] turns the bytes of one [`PageEntry`] into one or
//! three encoded assets with their [`PageDescriptor`]s:
//!
//! 1. crop margins (and detect blank pages)
//! 2. rotate landscape pages upright, when enabled
//! 3. auto-contrast
//! 4. brightness / contrast
//! 5. resize to fit the view box
//! 6. grayscale reduction
//! 7. substitute a 1×1 sentinel when nothing is left
//!
//! A double page that is not the cover can additionally be split: both halves
//! are cut from the unfiltered source and run through the same chain, minus
//! the rotation. An entry that cannot be read or decoded yields a placeholder
//! page carrying the [`PageError`]; it never fails the run.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use log::warn;

use crate::error::{PageError, Result};
use crate::source::RawPage;
use crate::types::{ImageEncoding, PageDescriptor, PageEntry, TransformOptions};

pub mod crop;
pub mod fit;
pub mod placeholder;
pub mod tone;

use crop::{crop_margins, detect_margins};
use fit::{resize_to_fit, rotate_upright, split_halves};
use placeholder::{placeholder_page, sentinel};
use tone::{auto_contrast, brightness_contrast, to_grayscale};

/// A descriptor and the encoded bytes of its asset.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub descriptor: PageDescriptor,
    pub asset: Vec<u8>,
}

/// Result of the filter chain for one raster.
struct Filtered {
    image: DynamicImage,
    is_double: bool,
    is_blank: bool,
}

/// Applies the configured filter chain to page entries.
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: TransformOptions,
}

impl Pipeline {
    pub fn new(options: TransformOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Entry 0 is the cover unless the book is configured without one.
    pub fn is_cover(&self, id: usize) -> bool {
        self.options.has_cover && id == 0
    }

    /// Processes one entry. Only encoding failures are returned as errors.
    pub fn process(
        &self,
        entry: &PageEntry,
        raw: std::result::Result<RawPage, PageError>,
    ) -> Result<Vec<Rendered>> {
        let raw = match raw {
            Ok(raw) => raw,
            Err(error) => return self.substitute(entry, error),
        };

        if self.options.encoding == ImageEncoding::Copy {
            return self.passthrough(entry, raw);
        }

        match decode(entry, raw) {
            Ok(image) => self.render(entry, image),
            Err(error) => self.substitute(entry, error),
        }
    }

    fn render(&self, entry: &PageEntry, image: DynamicImage) -> Result<Vec<Rendered>> {
        let options = &self.options;
        let aspect_ratio = aspect_ratio(&image);
        let may_rotate = options.auto_rotate && image.width() > image.height();

        let whole = self.filter(&image, may_rotate);
        let split =
            whole.is_double && options.auto_split_double_page && !self.is_cover(entry.id);

        let mut rendered = Vec::with_capacity(3);
        if !split || options.keep_double_page_if_split {
            rendered.push(self.finish(entry, 0, whole, aspect_ratio, None)?);
        }
        if split {
            let (first, second) = split_halves(&image, options.direction);
            for (part, half) in [(1, first), (2, second)] {
                let filtered = Filtered {
                    is_double: false,
                    ..self.filter(&half, false)
                };
                rendered.push(self.finish(entry, part, filtered, aspect_ratio, None)?);
            }
        }
        Ok(rendered)
    }

    fn filter(&self, image: &DynamicImage, may_rotate: bool) -> Filtered {
        let options = &self.options;

        let (cropped, is_blank) = if options.crop.enabled {
            let cropped = crop_margins(image, &options.crop);
            (cropped.image, cropped.is_blank)
        } else {
            let scan = detect_margins(&image.to_luma8(), &options.crop);
            (Some(image.clone()), scan.is_blank)
        };

        let Some(mut page) = cropped else {
            return Filtered {
                image: sentinel(),
                is_double: false,
                is_blank: true,
            };
        };

        let is_double = page.width() > page.height();
        if may_rotate && is_double {
            page = rotate_upright(&page, options.direction);
        }
        if options.auto_contrast {
            page = auto_contrast(&page);
        }
        page = brightness_contrast(page, options.brightness, options.contrast);
        page = resize_to_fit(&page, options.view_width, options.view_height);
        if let Some(mode) = options.grayscale {
            page = to_grayscale(&page, mode);
        }

        Filtered {
            image: page,
            is_double,
            is_blank,
        }
    }

    fn finish(
        &self,
        entry: &PageEntry,
        part: u8,
        filtered: Filtered,
        aspect_ratio: f32,
        error: Option<PageError>,
    ) -> Result<Rendered> {
        let encoding = match self.options.encoding {
            ImageEncoding::Copy => ImageEncoding::Jpeg,
            other => other,
        };
        let (asset, extension) = encode(&filtered.image, encoding, self.options.quality)?;
        let mut descriptor = new_descriptor(entry, part, &filtered.image, extension, asset.len());
        descriptor.is_double_page = filtered.is_double;
        descriptor.is_blank = filtered.is_blank;
        descriptor.original_aspect_ratio = aspect_ratio;
        descriptor.error = error;
        if part == 0 && entry.id == 0 {
            descriptor.raw = Some(filtered.image);
        }
        Ok(Rendered { descriptor, asset })
    }

    /// Placeholder page for an entry that could not be read or decoded.
    fn substitute(&self, entry: &PageEntry, error: PageError) -> Result<Vec<Rendered>> {
        warn!("Substituting a placeholder for {}: {}", entry.display_name(), error);

        let image = placeholder_page(
            &entry.display_name(),
            &error.to_string(),
            self.options.view_width,
            self.options.view_height,
        );
        let aspect_ratio = aspect_ratio(&image);
        let filtered = Filtered {
            image,
            is_double: false,
            is_blank: false,
        };
        Ok(vec![self.finish(entry, 0, filtered, aspect_ratio, Some(error))?])
    }

    /// `Copy` encoding: source bytes are kept verbatim and no filter runs.
    fn passthrough(&self, entry: &PageEntry, raw: RawPage) -> Result<Vec<Rendered>> {
        let bytes = match raw {
            RawPage::Encoded(bytes) => bytes,
            // Bare samples have no file format to copy.
            RawPage::Decoded(image) => {
                let filtered = Filtered {
                    is_double: image.width() > image.height(),
                    is_blank: false,
                    image,
                };
                let aspect_ratio = aspect_ratio(&filtered.image);
                return Ok(vec![self.finish(entry, 0, filtered, aspect_ratio, None)?]);
            }
        };

        let extension = image::guess_format(&bytes).ok().and_then(stored_extension);
        let dimensions = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| e.to_string())
            .and_then(|reader| reader.into_dimensions().map_err(|e| e.to_string()));

        let (extension, (width, height)) = match (extension, dimensions) {
            (Some(extension), Ok(dimensions)) => (extension, dimensions),
            (None, _) => {
                return match decode(entry, RawPage::Encoded(bytes)) {
                    Ok(image) => self.passthrough(entry, RawPage::Decoded(image)),
                    Err(error) => self.substitute(entry, error),
                };
            }
            (_, Err(reason)) => {
                let error = PageError::Decode {
                    name: entry.display_name(),
                    reason,
                };
                return self.substitute(entry, error);
            }
        };

        let raw = if entry.id == 0 {
            image::load_from_memory(&bytes).ok()
        } else {
            None
        };
        let descriptor = PageDescriptor {
            id: entry.id,
            part: 0,
            width,
            height,
            is_double_page: width > height,
            is_blank: false,
            raw,
            original_aspect_ratio: width as f32 / height.max(1) as f32,
            error: None,
            path: entry.path.clone(),
            name: entry.name.clone(),
            extension,
            size: bytes.len() as u64,
        };
        Ok(vec![Rendered {
            descriptor,
            asset: bytes,
        }])
    }
}

fn decode(entry: &PageEntry, raw: RawPage) -> std::result::Result<DynamicImage, PageError> {
    match raw {
        RawPage::Decoded(image) => Ok(image),
        RawPage::Encoded(bytes) => {
            image::load_from_memory(&bytes).map_err(|e| PageError::Decode {
                name: entry.display_name(),
                reason: e.to_string(),
            })
        }
    }
}

fn aspect_ratio(image: &DynamicImage) -> f32 {
    image.width() as f32 / image.height().max(1) as f32
}

fn stored_extension(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Tiff => Some("tiff"),
        _ => None,
    }
}

fn new_descriptor(
    entry: &PageEntry,
    part: u8,
    image: &DynamicImage,
    extension: &'static str,
    size: usize,
) -> PageDescriptor {
    PageDescriptor {
        id: entry.id,
        part,
        width: image.width(),
        height: image.height(),
        is_double_page: false,
        is_blank: false,
        raw: None,
        original_aspect_ratio: aspect_ratio(image),
        error: None,
        path: entry.path.clone(),
        name: entry.name.clone(),
        extension,
        size: size as u64,
    }
}

/// Encodes a raster as JPEG (at `quality`) or PNG. Returns the bytes and the
/// stored extension.
pub fn encode(
    image: &DynamicImage,
    encoding: ImageEncoding,
    quality: u8,
) -> Result<(Vec<u8>, &'static str)> {
    let mut bytes = Vec::new();
    match encoding {
        ImageEncoding::Png => {
            image.write_with_encoder(PngEncoder::new(&mut bytes))?;
            Ok((bytes, "png"))
        }
        ImageEncoding::Jpeg | ImageEncoding::Copy => {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
            match image {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => {
                    image.write_with_encoder(encoder)?
                }
                // JPEG carries neither alpha nor 16-bit samples.
                _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?,
            }
            Ok((bytes, "jpg"))
        }
    }
}
