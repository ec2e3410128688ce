//! Geometry: fit-to-box resizing, double page halves and rotation.

use image::DynamicImage;
use image::imageops::FilterType;

use crate::types::Direction;

/// Size of `(width, height)` scaled to fit `(box_width, box_height)`.
///
/// The aspect ratio is kept within rounding, the result never exceeds the box
/// and at least one side touches it.
pub fn fit_dimensions(width: u32, height: u32, box_width: u32, box_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || box_width == 0 || box_height == 0 {
        return (width.min(box_width), height.min(box_height));
    }
    let (w, h) = (width as u64, height as u64);
    let (bw, bh) = (box_width as u64, box_height as u64);

    if w * bh >= h * bw {
        // Wider than the box: width is the binding side.
        let fitted = ((h * bw + w / 2) / w).clamp(1, bh);
        (box_width, fitted as u32)
    } else {
        let fitted = ((w * bh + h / 2) / h).clamp(1, bw);
        (fitted as u32, box_height)
    }
}

/// Resizes with a Lanczos filter so the image fits the box exactly on one side.
pub fn resize_to_fit(image: &DynamicImage, box_width: u32, box_height: u32) -> DynamicImage {
    let (width, height) = fit_dimensions(image.width(), image.height(), box_width, box_height);
    if (width, height) == (image.width(), image.height()) {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::Lanczos3)
}

/// Left and right halves of a double page, in reading order.
///
/// The first half is the one read first: left for left-to-right books,
/// right for manga. Widths sum to the source width.
pub fn split_halves(image: &DynamicImage, direction: Direction) -> (DynamicImage, DynamicImage) {
    let left_width = image.width() / 2;
    let right_width = image.width() - left_width;
    let left = image.crop_imm(0, 0, left_width, image.height());
    let right = image.crop_imm(left_width, 0, right_width, image.height());
    match direction {
        Direction::Ltr => (left, right),
        Direction::Rtl => (right, left),
    }
}

/// Turns a landscape page upright. Manga pages rotate the other way so the
/// first-read half ends up on top.
pub fn rotate_upright(image: &DynamicImage, direction: Direction) -> DynamicImage {
    match direction {
        Direction::Ltr => image.rotate90(),
        Direction::Rtl => image.rotate270(),
    }
}
