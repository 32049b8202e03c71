//! Drawing primitives in wide coordinates
//!
//! Region origins span the whole `i32` range, so geometry is computed in
//! `i64` and clipped to the canvas before any pixel is touched.

use image::{Rgb, RgbImage};

/// Fill `[x0, x1) x [y0, y1)`, clipped to the canvas
pub(crate) fn fill_rect_clipped(canvas: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(canvas.width() as i64);
    let y1 = y1.min(canvas.height() as i64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for y in y0 as u32..y1 as u32 {
        for x in x0 as u32..x1 as u32 {
            canvas.put_pixel(x, y, color);
        }
    }
}

/// One-pixel outline of the `width x height` box at `(x, y)`
pub(crate) fn hollow_rect_clipped(canvas: &mut RgbImage, x: i64, y: i64, width: i64, height: i64, color: Rgb<u8>) {
    if width <= 0 || height <= 0 {
        return;
    }
    let (right, bottom) = (x + width, y + height);
    fill_rect_clipped(canvas, x, y, right, y + 1, color);
    fill_rect_clipped(canvas, x, bottom - 1, right, bottom, color);
    fill_rect_clipped(canvas, x, y, x + 1, bottom, color);
    fill_rect_clipped(canvas, right - 1, y, right, bottom, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    #[test]
    fn test_fill_is_clipped_to_canvas() {
        let mut canvas = RgbImage::new(10, 10);
        fill_rect_clipped(&mut canvas, -5, 8, 3, 40, RED);

        assert_eq!(*canvas.get_pixel(0, 8), RED);
        assert_eq!(*canvas.get_pixel(2, 9), RED);
        assert_eq!(*canvas.get_pixel(3, 9), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(0, 7), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_hollow_rect_leaves_interior() {
        let mut canvas = RgbImage::new(10, 10);
        hollow_rect_clipped(&mut canvas, 2, 2, 5, 4, RED);

        assert_eq!(*canvas.get_pixel(2, 2), RED);
        assert_eq!(*canvas.get_pixel(6, 5), RED);
        assert_eq!(*canvas.get_pixel(4, 3), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(7, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let mut canvas = RgbImage::new(10, 10);
        let max = i32::MAX as i64;
        let min = i32::MIN as i64;
        hollow_rect_clipped(&mut canvas, max - 3, max - 3, 200, 200, RED);
        hollow_rect_clipped(&mut canvas, min, min, 200, 200, RED);
        fill_rect_clipped(&mut canvas, min, min, max + 500, max + 500, RED);
        assert_eq!(*canvas.get_pixel(9, 9), RED);
    }
}
