//! Image enhancement ahead of QR decoding

use crate::config::QrConfig;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

/// Stretch contrast around the mean luminance.
///
/// Every colour channel is moved away from the image's mean grey level by
/// `factor`: `out = mean + factor * (in - mean)`, clamped to `0..=255`.
/// A factor of `1.0` leaves the image unchanged. Alpha is preserved.
pub fn enhance_contrast(image: &DynamicImage, factor: f32) -> DynamicImage {
    let luma = image.to_luma8();
    let count = (luma.width() as u64 * luma.height() as u64).max(1);
    let total: u64 = luma.pixels().map(|p| p.0[0] as u64).sum();
    let mean = (total as f32 / count as f32 + 0.5).floor();

    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            let stretched = mean + factor * (*channel as f32 - mean);
            *channel = stretched.round().clamp(0.0, 255.0) as u8;
        }
    }

    DynamicImage::ImageRgba8(rgba)
}

/// Contrast-enhance and resize to the fixed decode canvas, ignoring the
/// source aspect ratio, then reduce to greyscale for the detector.
pub fn prepare_for_decoding(image: &DynamicImage, config: &QrConfig) -> GrayImage {
    enhance_contrast(image, config.contrast_factor)
        .resize_exact(
            config.target_width,
            config.target_height,
            FilterType::CatmullRom,
        )
        .to_luma8()
}
