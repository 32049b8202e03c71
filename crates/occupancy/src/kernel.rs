//! Fixed-size Gaussian kernels and separable convolution
//!
//! `imageproc::filter::gaussian_blur_f32` derives its kernel size from sigma;
//! the preprocessing pipeline needs an exact kernel size with a chosen border
//! policy, so the convolution lives here.

use image::{GrayImage, Luma};

/// How samples outside the image are synthesised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Border {
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
}

impl Border {
    fn index(self, i: i64, len: usize) -> usize {
        let n = len as i64;
        if n == 1 {
            return 0;
        }
        match self {
            Border::Replicate => i.clamp(0, n - 1) as usize,
            Border::Reflect101 => {
                let mut i = i;
                while i < 0 || i >= n {
                    i = if i < 0 { -i } else { 2 * n - 2 - i };
                }
                i as usize
            }
        }
    }
}

/// Normalised 1-D Gaussian weights of odd length `size`.
///
/// A non-positive sigma is derived from the size as
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
pub(crate) fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f32> {
    debug_assert!(size % 2 == 1, "kernel size must be odd");
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let center = (size as f64 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);

    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Convolve rows then columns with the same kernel, rounding back to 8 bits
pub(crate) fn separable_filter(image: &GrayImage, kernel: &[f32], border: Border) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return image.clone();
    }
    let radius = (kernel.len() / 2) as i64;
    let src = image.as_raw();

    let mut rows = vec![0f32; w * h];
    for y in 0..h {
        let line = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = border.index(x as i64 + k as i64 - radius, w);
                acc += line[sx] as f32 * weight;
            }
            rows[y * w + x] = acc;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0f32;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = border.index(y as i64 + k as i64 - radius, h);
            acc += rows[sy * w + x as usize] * weight;
        }
        Luma([acc.round().clamp(0.0, 255.0) as u8])
    })
}
