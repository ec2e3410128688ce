//! Generated rasters: the error placeholder, the title page and the 1×1
//! sentinel.
//!
//! Text is drawn with a built-in 5×7 bitmap font so no font file has to ship
//! with the crate. Lowercase letters are drawn as capitals and anything the
//! font lacks becomes `?`.

use image::{DynamicImage, Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::transform::fit::resize_to_fit;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Glyph advance, one column of spacing included.
const ADVANCE: u32 = GLYPH_WIDTH + 1;
const LINE_HEIGHT: u32 = GLYPH_HEIGHT + 3;

const INK: Rgb<u8> = Rgb([32, 32, 32]);
const PAPER: Rgb<u8> = Rgb([236, 236, 236]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Rows of a glyph, top to bottom, bit 4 being the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x00, 0x00, 0x04],
        '\'' => [0x0C, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        ' ' => [0x00; 7],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

/// Pixel width of `text` drawn at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let count = text.chars().count() as u32;
    if count == 0 {
        0
    } else {
        (count * ADVANCE - 1) * scale
    }
}

/// Draws a single line of text with its top-left corner at `(x, y)`.
pub fn draw_text(canvas: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1);
    for (index, c) in text.chars().enumerate() {
        let origin_x = x + (index as u32 * ADVANCE * scale) as i32;
        for (row, bits) in glyph(c).iter().enumerate() {
            for column in 0..GLYPH_WIDTH {
                if bits & (0x10 >> column) == 0 {
                    continue;
                }
                let rect = Rect::at(
                    origin_x + (column * scale) as i32,
                    y + (row as u32 * scale) as i32,
                )
                .of_size(scale, scale);
                draw_filled_rect_mut(canvas, rect, color);
            }
        }
    }
}

/// Greedy word wrap to at most `columns` characters per line. Words longer
/// than a line are broken.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(columns);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.len();
        if needed > columns && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Largest integer scale at which `columns` glyphs fit in `width`, capped.
fn scale_for(width: u32, columns: u32, cap: u32) -> u32 {
    (width / (columns.max(1) * ADVANCE)).clamp(1, cap)
}

fn draw_block(canvas: &mut RgbImage, lines: &[String], top: u32, scale: u32, color: Rgb<u8>) -> u32 {
    let width = canvas.width();
    let mut y = top;
    for line in lines {
        let x = width.saturating_sub(text_width(line, scale)) / 2;
        draw_text(canvas, line, x as i32, y as i32, scale, color);
        y += LINE_HEIGHT * scale;
    }
    y
}

/// Page standing in for an entry that could not be read or decoded.
///
/// Names the entry and the reason so the bad file can be found from the
/// output book.
pub fn placeholder_page(name: &str, reason: &str, width: u32, height: u32) -> DynamicImage {
    let (width, height) = (width.max(1), height.max(1));
    let mut canvas = RgbImage::from_pixel(width, height, PAPER);

    let margin = (width.min(height) / 20).max(1);
    if width > 2 * margin && height > 2 * margin {
        let frame = Rect::at(margin as i32, margin as i32)
            .of_size(width - 2 * margin, height - 2 * margin);
        draw_hollow_rect_mut(&mut canvas, frame, INK);
    }

    let inner = width.saturating_sub(4 * margin).max(ADVANCE);
    let heading_scale = scale_for(inner, 16, 8);
    let body_scale = (heading_scale / 2).max(1);
    let columns = (inner / (ADVANCE * body_scale)).max(1) as usize;

    let heading = vec!["UNREADABLE PAGE".to_string()];
    let mut y = draw_block(&mut canvas, &heading, height / 4, heading_scale, INK);
    y += LINE_HEIGHT * body_scale;
    y = draw_block(&mut canvas, &wrap(name, columns), y, body_scale, INK);
    y += LINE_HEIGHT * body_scale;
    let mut reason_lines = wrap(reason, columns);
    reason_lines.truncate(6);
    draw_block(&mut canvas, &reason_lines, y, body_scale, INK);

    DynamicImage::ImageRgb8(canvas)
}

/// Title page derived from the cover: the cover blurred and dimmed behind a
/// white band carrying the title.
pub fn title_page(cover: &DynamicImage, title: &str, width: u32, height: u32) -> DynamicImage {
    let fitted = resize_to_fit(cover, width.max(1), height.max(1)).to_rgb8();
    let mut canvas = imageops::brighten(&imageops::blur(&fitted, 8.0), -60);

    let (width, height) = canvas.dimensions();
    let inner = width.saturating_sub(width / 10).max(ADVANCE);
    let longest = title.chars().count().clamp(1, 24) as u32;
    let scale = scale_for(inner, longest, 10);
    let columns = (inner / (ADVANCE * scale)).max(1) as usize;
    let mut lines = wrap(title, columns);
    lines.truncate(4);

    let padding = LINE_HEIGHT * scale;
    let band_height = (lines.len() as u32 * LINE_HEIGHT * scale + padding).min(height);
    let band_top = height.saturating_sub(band_height) / 2;
    let band = Rect::at(0, band_top as i32).of_size(width, band_height.max(1));
    draw_filled_rect_mut(&mut canvas, band, WHITE);
    draw_block(&mut canvas, &lines, band_top + padding / 2 + scale, scale, INK);

    DynamicImage::ImageRgb8(canvas)
}

/// 1×1 white page emitted when a transform leaves nothing to show.
pub fn sentinel() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, WHITE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_breaks_on_words_and_long_tokens() {
        assert_eq!(wrap("bad page here", 8), vec!["bad page", "here"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(wrap("", 4).is_empty());
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("", 3), 0);
        assert_eq!(text_width("A", 1), 5);
        assert_eq!(text_width("AB", 2), 22);
    }

    #[test]
    fn test_placeholder_has_requested_size_and_ink() {
        let page = placeholder_page("ch1/002.jpg", "invalid JPEG marker", 300, 400).to_rgb8();
        assert_eq!(page.dimensions(), (300, 400));
        assert!(page.pixels().any(|p| *p == INK));
        assert!(page.pixels().any(|p| *p == PAPER));
    }

    #[test]
    fn test_title_page_fits_box() {
        let cover = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 150, Rgb([200, 50, 50])));
        let page = title_page(&cover, "My Comic", 200, 200).to_rgb8();
        assert_eq!(page.dimensions(), (133, 200));
        assert!(page.pixels().any(|p| *p == WHITE));
        assert!(page.pixels().any(|p| *p == INK));
    }

    #[test]
    fn test_sentinel() {
        let page = sentinel();
        assert_eq!((page.width(), page.height()), (1, 1));
        assert_eq!(page.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }
}
