//! Margin detection and cropping.
//!
//! Each edge is scanned inward one line at a time. A line belongs to the
//! margin while its count of non-blank pixels stays within the tolerated share
//! of the line length (`ratio` percent), so scanner dust and page numbers do
//! not stop the crop. A page whose margins meet in the middle is blank.

use image::{DynamicImage, GrayImage};

use crate::types::CropOptions;

/// Luma above which a pixel counts as paper.
pub const BLANK_LUMA_THRESHOLD: u8 = 224;

/// Axis-aligned region of an image, `width`/`height` may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Raw result of the margin scan, before any limit is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginScan {
    pub bounds: Bounds,
    pub is_blank: bool,
}

fn is_blank_pixel(luma: u8) -> bool {
    luma > BLANK_LUMA_THRESHOLD
}

fn allowed_non_blank(length: u32, ratio: u32) -> u64 {
    length as u64 * ratio as u64 / 100
}

fn column_non_blank(luma: &GrayImage, x: u32, top: u32, bottom: u32) -> u64 {
    (top..bottom)
        .filter(|&y| !is_blank_pixel(luma.get_pixel(x, y).0[0]))
        .count() as u64
}

fn row_non_blank(luma: &GrayImage, y: u32, left: u32, right: u32) -> u64 {
    let width = luma.width() as usize;
    let start = y as usize * width;
    luma.as_raw()[start + left as usize..start + right as usize]
        .iter()
        .filter(|&&value| !is_blank_pixel(value))
        .count() as u64
}

/// Scans the four edges of a luma image: left, right, top, bottom.
pub fn detect_margins(luma: &GrayImage, options: &CropOptions) -> MarginScan {
    let (mut left, mut right) = (0, luma.width());
    let (mut top, mut bottom) = (0, luma.height());

    while left < right
        && column_non_blank(luma, left, top, bottom)
            <= allowed_non_blank(bottom - top, options.ratio_left)
    {
        left += 1;
    }
    while right > left
        && column_non_blank(luma, right - 1, top, bottom)
            <= allowed_non_blank(bottom - top, options.ratio_right)
    {
        right -= 1;
    }
    while top < bottom
        && row_non_blank(luma, top, left, right) <= allowed_non_blank(right - left, options.ratio_up)
    {
        top += 1;
    }
    while bottom > top
        && row_non_blank(luma, bottom - 1, left, right)
            <= allowed_non_blank(right - left, options.ratio_bottom)
    {
        bottom -= 1;
    }

    let bounds = Bounds {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    };
    MarginScan {
        bounds,
        is_blank: bounds.is_empty(),
    }
}

/// Keeps `length` inside `[0, full)` around the centre of `[start, start + kept)`,
/// or around the centre of the image when nothing was kept.
fn recenter(start: u32, kept: u32, full: u32, length: u32) -> u32 {
    let centre = if kept == 0 {
        full as u64 / 2
    } else {
        start as u64 + kept as u64 / 2
    };
    let start = centre.saturating_sub(length as u64 / 2);
    start.min((full - length) as u64) as u32
}

/// Clamps the crop so at most `limit` percent of either dimension is removed.
///
/// Over the limit, the kept region is grown around its centre to remove
/// exactly the limit, or the whole crop is dropped when
/// `skip_if_limit_reached` is set.
pub fn apply_limit(scan: Bounds, width: u32, height: u32, options: &CropOptions) -> Bounds {
    if options.limit == 0 {
        return scan;
    }
    let max_cut_x = width as u64 * options.limit as u64 / 100;
    let max_cut_y = height as u64 * options.limit as u64 / 100;
    let over_x = (width - scan.width) as u64 > max_cut_x;
    let over_y = (height - scan.height) as u64 > max_cut_y;

    if !over_x && !over_y {
        return scan;
    }
    if options.skip_if_limit_reached {
        return Bounds::full(width, height);
    }

    let mut bounds = scan;
    if over_x {
        bounds.width = width - max_cut_x as u32;
        bounds.x = recenter(scan.x, scan.width, width, bounds.width);
    }
    if over_y {
        bounds.height = height - max_cut_y as u32;
        bounds.y = recenter(scan.y, scan.height, height, bounds.height);
    }
    bounds
}

/// Outcome of the crop step.
#[derive(Debug, Clone)]
pub struct Cropped {
    /// `None` when the kept region is degenerate.
    pub image: Option<DynamicImage>,
    /// From the uncorrected scan, whatever the limit policy did afterwards.
    pub is_blank: bool,
}

/// Detects margins, applies the limit and crops.
pub fn crop_margins(image: &DynamicImage, options: &CropOptions) -> Cropped {
    let luma = image.to_luma8();
    let scan = detect_margins(&luma, options);
    let bounds = apply_limit(scan.bounds, image.width(), image.height(), options);

    let image = if bounds.is_empty() {
        None
    } else if bounds == Bounds::full(image.width(), image.height()) {
        Some(image.clone())
    } else {
        Some(image.crop_imm(bounds.x, bounds.y, bounds.width, bounds.height))
    };

    Cropped {
        image,
        is_blank: scan.is_blank,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn page_with_block(width: u32, height: u32, block: Bounds) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = x >= block.x
                && x < block.x + block.width
                && y >= block.y
                && y < block.y + block.height;
            Luma([if inside { 0 } else { 255 }])
        })
    }

    fn strict() -> CropOptions {
        CropOptions {
            ratio_left: 0,
            ratio_up: 0,
            ratio_right: 0,
            ratio_bottom: 0,
            ..CropOptions::default()
        }
    }

    #[test]
    fn test_detects_content_block() {
        let block = Bounds {
            x: 10,
            y: 20,
            width: 30,
            height: 40,
        };
        let scan = detect_margins(&page_with_block(100, 100, block), &strict());
        assert_eq!(scan.bounds, block);
        assert!(!scan.is_blank);
    }

    #[test]
    fn test_tolerates_noise_within_ratio() {
        let block = Bounds {
            x: 20,
            y: 20,
            width: 60,
            height: 60,
        };
        let mut luma = page_with_block(100, 100, block);
        // A speck in the left margin: 1 pixel of a 100 pixel column.
        luma.put_pixel(2, 50, Luma([0]));

        let tolerant = CropOptions::default();
        assert_eq!(detect_margins(&luma, &tolerant).bounds.x, 20);
        assert_eq!(detect_margins(&luma, &strict()).bounds.x, 2);
    }

    #[test]
    fn test_crop_is_idempotent() {
        let block = Bounds {
            x: 13,
            y: 7,
            width: 50,
            height: 61,
        };
        let image = DynamicImage::ImageLuma8(page_with_block(90, 80, block));
        let options = CropOptions::default();

        let once = crop_margins(&image, &options).image.unwrap();
        let twice = crop_margins(&once, &options).image.unwrap();
        assert_eq!((once.width(), once.height()), (50, 61));
        assert_eq!((twice.width(), twice.height()), (50, 61));
    }

    #[test]
    fn test_blank_page_collapses() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([250])));
        let cropped = crop_margins(&image, &CropOptions::default());
        assert!(cropped.is_blank);
        assert!(cropped.image.is_none());
    }

    #[test]
    fn test_limit_recenters_crop() {
        let block = Bounds {
            x: 40,
            y: 0,
            width: 20,
            height: 100,
        };
        let options = CropOptions {
            limit: 10,
            ..strict()
        };
        let bounds = apply_limit(block, 100, 100, &options);
        assert_eq!(bounds.width, 90);
        assert_eq!(bounds.height, 100);
        assert_eq!(bounds.x, 5);
    }

    #[test]
    fn test_limit_skip_keeps_original_bounds() {
        let block = Bounds {
            x: 40,
            y: 0,
            width: 20,
            height: 100,
        };
        let options = CropOptions {
            limit: 10,
            skip_if_limit_reached: true,
            ..strict()
        };
        assert_eq!(apply_limit(block, 100, 100, &options), Bounds::full(100, 100));
    }

    #[test]
    fn test_limit_centres_blank_page() {
        let luma = GrayImage::from_pixel(50, 50, Luma([255]));
        let options = CropOptions {
            limit: 10,
            ..strict()
        };
        let scan = detect_margins(&luma, &options);
        assert!(scan.is_blank);
        assert_eq!(
            apply_limit(scan.bounds, 50, 50, &options),
            Bounds {
                x: 3,
                y: 3,
                width: 45,
                height: 45,
            }
        );
    }

    #[test]
    fn test_blank_flag_survives_limit_policy() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 50, Luma([255])));
        for skip in [false, true] {
            let options = CropOptions {
                limit: 10,
                skip_if_limit_reached: skip,
                ..CropOptions::default()
            };
            let cropped = crop_margins(&image, &options);
            assert!(cropped.is_blank);
            // The limit keeps a region, so no degenerate image either way.
            assert!(cropped.image.is_some());
        }
    }
}
