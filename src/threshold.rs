//! Threshold selection and binarization.
//!
//! Two binarizations are used by the pipeline: a fixed-level split at the
//! adaptive threshold chosen from the image statistics, and an automatic
//! Otsu split used when isolating foreground strokes.

use image::{GrayImage, Luma, RgbImage};

use crate::color::luminance;
use crate::stats::ChannelMetrics;

/// Choose the binarization threshold for an image.
///
/// - monochrome: the mean spread `s`
/// - color: `m - (m - s) / 2`, i.e. the mean pulled halfway toward the spread
///
/// This is an empirical policy tuned against existing templates.
#[must_use]
pub fn select_threshold(mean_of_means: f32, mean_of_spreads: f32, has_color: bool) -> f32 {
    if has_color {
        let delta = (mean_of_means - mean_of_spreads) / 2.0;
        mean_of_means - delta
    } else {
        mean_of_spreads
    }
}

/// [`select_threshold`] over a metrics record.
#[must_use]
pub fn threshold_for(metrics: &ChannelMetrics, has_color: bool) -> f32 {
    select_threshold(metrics.mean_of_means, metrics.mean_of_spreads, has_color)
}

/// Binarize at a fixed level: 255 where luminance is strictly above `t`, else 0.
///
/// The result keeps three channels so it composes with the working image.
#[must_use]
pub fn binarize(image: &RgbImage, t: f32) -> RgbImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let v = if f32::from(luminance(*px)) > t { 255 } else { 0 };
        px.0 = [v, v, v];
    }
    out
}

/// Otsu's level: the split that maximizes between-class variance.
///
/// A histogram with only one populated bin has no split and yields 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn otsu_level(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for px in gray.pixels() {
        histogram[usize::from(px[0])] += 1;
    }

    let total = u64::from(gray.width()) * u64::from(gray.height());
    if total == 0 {
        return 0;
    }
    let total = total as f64;

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_background = 0.0_f64;
    let mut weight_background = 0.0_f64;
    let mut best_variance = 0.0_f64;
    let mut best_level = 0u8;

    for (level, &count) in (0u8..=255).zip(histogram.iter()) {
        weight_background += count as f64;
        sum_background += f64::from(level) * count as f64;

        let weight_foreground = total - weight_background;
        if weight_background == 0.0 || weight_foreground == 0.0 {
            continue;
        }

        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_total - sum_background) / weight_foreground;
        let diff = mean_background - mean_foreground;
        let variance = weight_background * weight_foreground * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_level = level;
        }
    }

    best_level
}

/// Otsu binarization with inverted polarity: dark pixels become 255.
#[must_use]
pub fn binarize_otsu_inverted(gray: &GrayImage) -> (GrayImage, u8) {
    let level = otsu_level(gray);
    let mut out = gray.clone();
    for px in out.pixels_mut() {
        *px = if px[0] > level { Luma([0]) } else { Luma([255]) };
    }
    (out, level)
}
