//! Frame preprocessing: raw colour frame to binary edge-density map
//!
//! The pipeline is fixed; the parameters below are what the occupancy
//! threshold was calibrated against.

use frame_source::VideoFrame;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::dilate;

use crate::kernel::{gaussian_kernel, separable_filter, Border};

/// Smoothing kernel size
pub const BLUR_KERNEL_SIZE: usize = 3;
/// Smoothing sigma
pub const BLUR_SIGMA: f64 = 1.0;
/// Neighbourhood of the Gaussian-weighted local mean
pub const THRESHOLD_BLOCK_SIZE: usize = 25;
/// A pixel this much darker than its local mean becomes foreground
pub const THRESHOLD_BIAS: i16 = 16;
/// Speckle suppression window
pub const MEDIAN_KERNEL_SIZE: u32 = 5;
/// 3x3 square structuring element
pub const DILATE_RADIUS: u8 = 1;

const FOREGROUND: u8 = 255;

/// Two-level image: 255 where edges are dense, 0 elsewhere
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMap {
    image: GrayImage,
}

impl BinaryMap {
    /// All-background map
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Binarise any grayscale image: non-zero pixels become foreground
    pub fn from_image(mut image: GrayImage) -> Self {
        for p in image.pixels_mut() {
            if p[0] != 0 {
                p[0] = FOREGROUND;
            }
        }
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Mark a rectangle as foreground, clipped to the map
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        if let Some((x0, y0, x1, y1)) = self.clip(x, y, width, height) {
            for yy in y0..y1 {
                for xx in x0..x1 {
                    self.image.put_pixel(xx, yy, Luma([FOREGROUND]));
                }
            }
        }
    }

    /// Count foreground pixels in `[x, x+width) x [y, y+height)`.
    ///
    /// The part of the rectangle outside the map contributes nothing.
    pub fn count_nonzero(&self, x: i32, y: i32, width: u32, height: u32) -> u32 {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, width, height) else {
            return 0;
        };
        let stride = self.image.width() as usize;
        let raw = self.image.as_raw();

        (y0..y1)
            .map(|row| {
                let start = row as usize * stride;
                raw[start + x0 as usize..start + x1 as usize]
                    .iter()
                    .filter(|&&v| v != 0)
                    .count() as u32
            })
            .sum()
    }

    /// Intersect a rectangle with the map bounds as `(x0, y0, x1, y1)`
    fn clip(&self, x: i32, y: i32, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = (x as i64).max(0);
        let y0 = (y as i64).max(0);
        let x1 = (x as i64 + width as i64).min(self.width() as i64);
        let y1 = (y as i64 + height as i64).min(self.height() as i64);

        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Convert a frame into its binary edge-density map.
///
/// 1. luminance
/// 2. 3x3 Gaussian blur, sigma 1
/// 3. inverted adaptive Gaussian threshold, block 25, bias 16
/// 4. 5x5 median
/// 5. 3x3 dilation, one iteration
pub fn preprocess(frame: &VideoFrame) -> BinaryMap {
    let gray = frame.to_grayscale();
    let blurred = separable_filter(
        &gray,
        &gaussian_kernel(BLUR_KERNEL_SIZE, BLUR_SIGMA),
        Border::Reflect101,
    );
    let thresholded = adaptive_threshold_inv(&blurred, THRESHOLD_BLOCK_SIZE, THRESHOLD_BIAS);
    let radius = MEDIAN_KERNEL_SIZE / 2;
    let despeckled = median_filter(&thresholded, radius, radius);
    let dilated = dilate(&despeckled, Norm::LInf, DILATE_RADIUS);

    BinaryMap { image: dilated }
}

/// Foreground where a pixel is at least `bias` darker than its
/// Gaussian-weighted neighbourhood mean
fn adaptive_threshold_inv(image: &GrayImage, block_size: usize, bias: i16) -> GrayImage {
    let mean = separable_filter(image, &gaussian_kernel(block_size, 0.0), Border::Replicate);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let diff = image.get_pixel(x, y)[0] as i16 - mean.get_pixel(x, y)[0] as i16;
        if diff <= -bias {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}
