//! Rendering of classification results onto a frame copy

use frame_source::VideoFrame;
use image::{Rgb, RgbImage};

use crate::classifier::{Classification, OutlineStyle};
use crate::draw::hollow_rect_clipped;
use crate::text::{put_text_rect, TextStyle};
use crate::OccupancyConfig;

/// Anchor (baseline-left) of the summary label
pub const SUMMARY_ANCHOR: (i32, i32) = (100, 50);
const SUMMARY_STYLE: TextStyle = TextStyle {
    scale: 3,
    offset: 20,
    background: Rgb([0, 200, 0]),
};

/// Summary label text
pub fn summary_label(free_count: usize, total_count: usize) -> String {
    format!("Free: {}/{}", free_count, total_count)
}

/// Draws space outlines, per-space signal values and the summary label
#[derive(Debug, Clone)]
pub struct FrameAnnotator {
    region_width: u32,
    region_height: u32,
}

impl FrameAnnotator {
    pub fn new(config: &OccupancyConfig) -> Self {
        Self {
            region_width: config.region_width,
            region_height: config.region_height,
        }
    }

    /// Annotate a copy of `frame`; the caller's frame is left untouched
    pub fn annotate(&self, frame: &VideoFrame, classification: &Classification) -> RgbImage {
        let mut canvas = frame.image.clone();

        for space in &classification.spaces {
            let style = space.style();
            let (x, y) = (space.region.x, space.region.y);
            self.draw_outline(&mut canvas, x, y, style);
            put_text_rect(
                &mut canvas,
                &space.signal.to_string(),
                (x as i64, y as i64 + self.region_height as i64 - 3),
                TextStyle {
                    scale: 1,
                    offset: 0,
                    background: Rgb(style.color),
                },
            );
        }

        put_text_rect(
            &mut canvas,
            &summary_label(classification.free_count, classification.total_count),
            (SUMMARY_ANCHOR.0 as i64, SUMMARY_ANCHOR.1 as i64),
            SUMMARY_STYLE,
        );
        canvas
    }

    /// Rectangle from `(x, y)` to `(x + width, y + height)`, line centred on the edge
    fn draw_outline(&self, canvas: &mut RgbImage, x: i32, y: i32, style: OutlineStyle) {
        let color = Rgb(style.color);
        let half = (style.thickness / 2) as i64;

        for k in 0..style.thickness as i64 {
            let grow = k - half;
            hollow_rect_clipped(
                canvas,
                x as i64 - grow,
                y as i64 - grow,
                self.region_width as i64 + 1 + 2 * grow,
                self.region_height as i64 + 1 + 2 * grow,
                color,
            );
        }
    }
}
