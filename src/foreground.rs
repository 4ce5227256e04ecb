//! Foreground (text stroke) extraction.
//!
//! The silhouette is a heuristic: Otsu split with inverted polarity so dark
//! strokes turn on, a 3x3 dilation to close anti-aliasing gaps, then an
//! inversion so foreground reads 0 (keep) on a 255 (removable) background.
//! Background texture occasionally lands in the foreground class.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::color::luminance;
use crate::threshold::binarize_otsu_inverted;

/// Reduce an RGB image to a single luminance channel.
#[must_use]
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luminance(*image.get_pixel(x, y))])
    })
}

/// Extract probable foreground from a grayscale image.
///
/// Output is a binary mask: 0 on foreground, 255 elsewhere.
#[must_use]
pub fn extract_foreground_gray(gray: &GrayImage) -> GrayImage {
    let (strokes, level) = binarize_otsu_inverted(gray);
    tracing::trace!(otsu_level = level, "foreground split");

    // L-inf radius 1 is a 3x3 square structuring element.
    let mut dilated = dilate(&strokes, Norm::LInf, 1);
    for px in dilated.pixels_mut() {
        px[0] = 255 - px[0];
    }
    dilated
}

/// Extract probable foreground from a (binarized) working image.
#[must_use]
pub fn extract_foreground(image: &RgbImage) -> GrayImage {
    extract_foreground_gray(&to_gray(image))
}
