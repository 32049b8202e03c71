//! Label rendering with a built-in 5x7 bitmap font

use image::{Rgb, RgbImage};

use crate::draw::fill_rect_clipped;

const GLYPH_COLS: u32 = 5;
const GLYPH_ROWS: u32 = 7;
/// Horizontal advance in font dots, including one dot of spacing
const GLYPH_ADVANCE: u32 = GLYPH_COLS + 1;
/// Pixels per font dot at scale 1
const DOT_SIZE: u32 = 2;

/// Label text colour
pub(crate) const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Label appearance
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextStyle {
    pub scale: u32,
    /// Padding around the text inside the background box
    pub offset: i32,
    pub background: Rgb<u8>,
}

/// Rows of a glyph, most significant of the low five bits is the leftmost dot
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'r' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10000, 0b10000, 0b10000],
        'e' => [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '/' => [0b00000, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        ' ' => [0; 7],
        // Unknown characters render as a hollow box
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}

/// Width and height in pixels of `text` rendered at `scale`
pub(crate) fn measure_text(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return (0, 0);
    }
    let dot = DOT_SIZE * scale.max(1);
    ((chars * GLYPH_ADVANCE - 1) * dot, GLYPH_ROWS * dot)
}

/// Draw `text` with its baseline-left corner at `(x, y)` on a filled box.
///
/// The box spans the measured text plus `offset` on every side. Anything
/// outside the image is clipped.
pub(crate) fn put_text_rect(image: &mut RgbImage, text: &str, (x, y): (i64, i64), style: TextStyle) {
    let (text_w, text_h) = measure_text(text, style.scale);
    if text_w == 0 {
        return;
    }

    let pad = style.offset.max(0) as i64;
    let (text_w, text_h) = (text_w as i64, text_h as i64);
    let top = y - text_h;
    fill_rect_clipped(image, x - pad, top - pad, x + text_w + pad, y + pad, style.background);

    let dot = (DOT_SIZE * style.scale.max(1)) as i64;
    let advance = GLYPH_ADVANCE as i64 * dot;
    for (i, c) in text.chars().enumerate() {
        let left = x + i as i64 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            let dot_y = top + row as i64 * dot;
            for col in 0..GLYPH_COLS {
                if bits & (1 << (GLYPH_COLS - 1 - col)) == 0 {
                    continue;
                }
                let dot_x = left + col as i64 * dot;
                fill_rect_clipped(image, dot_x, dot_y, dot_x + dot, dot_y + dot, TEXT_COLOR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: Rgb<u8> = Rgb([0, 200, 0]);

    #[test]
    fn test_measure_text() {
        assert_eq!(measure_text("", 3), (0, 0));
        assert_eq!(measure_text("0", 1), (10, 14));
        assert_eq!(measure_text("900", 1), (34, 14));
        assert_eq!(measure_text("Free: 1/1", 3), ((9 * 6 - 1) * 6, 42));
    }

    #[test]
    fn test_background_box_covers_text_plus_offset() {
        let mut image = RgbImage::new(200, 100);
        let style = TextStyle {
            scale: 1,
            offset: 5,
            background: GREEN,
        };
        put_text_rect(&mut image, " ", (20, 40), style);

        // Box spans x 15..=34 and y 21..=44 for a 10x14 glyph cell
        assert_eq!(*image.get_pixel(15, 21), GREEN);
        assert_eq!(*image.get_pixel(34, 44), GREEN);
        assert_eq!(*image.get_pixel(14, 30), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(20, 46), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_glyph_dots_use_text_color() {
        let mut image = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        let style = TextStyle {
            scale: 1,
            offset: 0,
            background: GREEN,
        };
        put_text_rect(&mut image, "1", (10, 30), style);

        // Top row of '1' has its single dot in column 2
        assert_eq!(*image.get_pixel(10 + 4, 16), TEXT_COLOR);
        assert_eq!(*image.get_pixel(10, 16), GREEN);
    }

    #[test]
    fn test_clipped_text_does_not_panic() {
        let mut image = RgbImage::new(20, 20);
        let style = TextStyle {
            scale: 3,
            offset: 20,
            background: GREEN,
        };
        put_text_rect(&mut image, "Free: 10/12", (-50, 5), style);
        put_text_rect(&mut image, "Free: 10/12", (500, 500), style);
        put_text_rect(&mut image, "2000", (i32::MAX as i64, i32::MAX as i64 + 45), style);
        put_text_rect(&mut image, "2000", (i32::MIN as i64, i32::MIN as i64), style);
    }
}
