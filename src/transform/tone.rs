//! Tone filters: auto-contrast, brightness/contrast and grayscale reduction.

use image::{DynamicImage, GrayImage, Luma, RgbImage, RgbaImage};
use rayon::prelude::*;

use crate::types::GrayscaleMode;

const REC601: [f32; 3] = [0.299, 0.587, 0.114];

fn luma601(r: u8, g: u8, b: u8) -> f32 {
    (REC601[0] * r as f32 + REC601[1] * g as f32 + REC601[2] * b as f32) / 255.0
}

/// Gray level (0..1) below which half of the pixels fall.
pub fn median_level(histogram: &[u64; 256]) -> f32 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0.5;
    }
    let half = total.div_ceil(2);
    let mut seen = 0;
    for (level, count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= half {
            return level as f32 / 255.0;
        }
    }
    1.0
}

fn histogram(luma: &GrayImage) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for value in luma.as_raw() {
        bins[*value as usize] += 1;
    }
    bins
}

/// Multiplier applied to a pixel of luma `y` for median level `v`.
fn contrast_factor(v: f32, y: f32) -> f32 {
    let darken = v * v;
    let lighten = (1.0 - v) * (1.0 - v);
    (1.0 - darken) + (darken + lighten) * y
}

fn scale(channel: u8, factor: f32) -> u8 {
    (channel as f32 * factor).round().clamp(0.0, 255.0) as u8
}

/// Stretches washed-out scans: dark pixels are darkened and light ones kept,
/// in proportion to how far the median gray sits from the extremes.
pub fn auto_contrast(image: &DynamicImage) -> DynamicImage {
    let v = median_level(&histogram(&image.to_luma8()));

    match image {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = gray.clone();
            out.par_iter_mut().for_each(|value| {
                let factor = contrast_factor(v, *value as f32 / 255.0);
                *value = scale(*value, factor);
            });
            DynamicImage::ImageLuma8(out)
        }
        DynamicImage::ImageRgba8(_) | DynamicImage::ImageLumaA8(_) => {
            let mut out: RgbaImage = image.to_rgba8();
            out.par_chunks_mut(4).for_each(|px| {
                let factor = contrast_factor(v, luma601(px[0], px[1], px[2]));
                for channel in &mut px[..3] {
                    *channel = scale(*channel, factor);
                }
            });
            DynamicImage::ImageRgba8(out)
        }
        _ => {
            let mut out: RgbImage = image.to_rgb8();
            out.par_chunks_mut(3).for_each(|px| {
                let factor = contrast_factor(v, luma601(px[0], px[1], px[2]));
                for channel in px.iter_mut() {
                    *channel = scale(*channel, factor);
                }
            });
            DynamicImage::ImageRgb8(out)
        }
    }
}

/// Linear brightness and contrast, both in `-100..=100`. Zero is a no-op.
pub fn brightness_contrast(image: DynamicImage, brightness: i32, contrast: i32) -> DynamicImage {
    let mut image = image;
    if brightness != 0 {
        image = image.brighten(brightness * 255 / 100);
    }
    if contrast != 0 {
        image = image.adjust_contrast(contrast as f32);
    }
    image
}

/// Reduces to a single channel with the selected reducer.
pub fn to_grayscale(image: &DynamicImage, mode: GrayscaleMode) -> DynamicImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return DynamicImage::ImageLuma8(gray.clone());
    }
    match mode {
        // image's own conversion uses the Rec. 709 weights.
        GrayscaleMode::Luminance => DynamicImage::ImageLuma8(image.to_luma8()),
        GrayscaleMode::Normal | GrayscaleMode::Average => {
            let rgb = image.to_rgb8();
            let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                let value = match mode {
                    GrayscaleMode::Average => (r as u16 + g as u16 + b as u16) / 3,
                    _ => (luma601(r, g, b) * 255.0).round() as u16,
                };
                Luma([value.min(255) as u8])
            });
            DynamicImage::ImageLuma8(gray)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_median_level() {
        let mut bins = [0u64; 256];
        bins[10] = 3;
        bins[200] = 2;
        assert_eq!(median_level(&bins), 10.0 / 255.0);

        bins[200] = 10;
        assert_eq!(median_level(&bins), 200.0 / 255.0);

        assert_eq!(median_level(&[0; 256]), 0.5);
    }

    #[test]
    fn test_auto_contrast_keeps_white_and_darkens_gray() {
        let mut buffer = GrayImage::from_pixel(10, 10, Luma([255]));
        for x in 0..10 {
            for y in 0..4 {
                buffer.put_pixel(x, y, Luma([128]));
            }
        }
        let result = auto_contrast(&DynamicImage::ImageLuma8(buffer)).to_luma8();
        assert_eq!(result.get_pixel(0, 9).0[0], 255);
        assert!(result.get_pixel(0, 0).0[0] < 128);
    }

    #[test]
    fn test_auto_contrast_preserves_size_and_layout() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 5, Rgb([90, 120, 200])));
        let result = auto_contrast(&image);
        assert_eq!((result.width(), result.height()), (7, 5));
        assert!(matches!(result, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_brightness_zero_is_noop() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])));
        let result = brightness_contrast(image.clone(), 0, 0);
        assert_eq!(result.to_rgb8(), image.to_rgb8());

        let brighter = brightness_contrast(image, 20, 0).to_rgb8();
        assert_eq!(brighter.get_pixel(0, 0).0, [61, 71, 81]);
    }

    #[test]
    fn test_grayscale_reducers() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        let normal = to_grayscale(&image, GrayscaleMode::Normal).to_luma8();
        let average = to_grayscale(&image, GrayscaleMode::Average).to_luma8();
        let luminance = to_grayscale(&image, GrayscaleMode::Luminance).to_luma8();
        assert_eq!(normal.get_pixel(0, 0).0[0], 76);
        assert_eq!(average.get_pixel(0, 0).0[0], 85);
        assert!(luminance.get_pixel(0, 0).0[0] < normal.get_pixel(0, 0).0[0]);
    }
}
