//! Page-image preprocessing ahead of OCR.
//!
//! Order matters: grayscale, contrast boost, mid-threshold binarization,
//! median denoise, sharpen. Each step feeds the next; the output is the
//! image handed to the OCR engine.

use image::{imageops, DynamicImage, GrayImage, Luma};

/// Contrast boost applied before binarization.
const CONTRAST_BOOST: f32 = 25.0;

/// Mid-point threshold for binarization.
const BINARIZE_THRESHOLD: u8 = 128;

/// 3x3 sharpening kernel.
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Run the full preprocessing chain on a rendered page.
pub fn preprocess_page(page: &DynamicImage) -> GrayImage {
    let gray = page.to_luma8();
    let contrasted = imageops::contrast(&gray, CONTRAST_BOOST);
    let binary = binarize(&contrasted, BINARIZE_THRESHOLD);
    let denoised = median_denoise(&binary);
    imageops::filter3x3(&denoised, &SHARPEN_KERNEL)
}

/// Map every pixel to pure black or white around `threshold`.
fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] >= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// 3x3 median filter. Border pixels clamp to the image edge.
fn median_denoise(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut neighborhood = [0u8; 9];
        let mut i = 0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = (i64::from(x) + dx).clamp(0, i64::from(width) - 1) as u32;
                let ny = (i64::from(y) + dy).clamp(0, i64::from(height) - 1) as u32;
                neighborhood[i] = image.get_pixel(nx, ny)[0];
                i += 1;
            }
        }
        neighborhood.sort_unstable();
        Luma([neighborhood[4]])
    })
}
