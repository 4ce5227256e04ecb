//! Global brightness and per-channel mean/spread summaries.
//!
//! The three scalars computed here drive every downstream decision:
//! - `brightness`: mean of every sample across every channel, used to spot
//!   carbon-copy scans
//! - `mean_of_means`: average of the per-channel means (overall color balance)
//! - `mean_of_spreads`: average of the per-channel standard deviations
//!   (overall contrast)

use image::{ImageBuffer, Pixel};

use crate::error::{Error, Result};

/// Summary statistics of an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMetrics {
    /// Mean of all samples across all channels.
    pub brightness: f32,
    /// Mean of the per-channel means.
    pub mean_of_means: f32,
    /// Mean of the per-channel population standard deviations.
    pub mean_of_spreads: f32,
}

/// Compute per-channel mean and population standard deviation.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] for a zero-area image.
pub fn channel_mean_std_dev<P>(image: &ImageBuffer<P, Vec<u8>>) -> Result<(Vec<f64>, Vec<f64>)>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::invalid_image(
            "statistics",
            format!("image has zero area ({w}x{h})"),
        ));
    }

    let channels = usize::from(P::CHANNEL_COUNT);
    let mut sum = vec![0.0_f64; channels];
    let mut sum_sq = vec![0.0_f64; channels];

    for px in image.pixels() {
        for (ch, &v) in px.channels().iter().enumerate() {
            let v = f64::from(v);
            sum[ch] += v;
            sum_sq[ch] += v * v;
        }
    }

    let n = f64::from(w) * f64::from(h);
    let means: Vec<f64> = sum.iter().map(|s| s / n).collect();
    let std_devs = sum_sq
        .iter()
        .zip(&means)
        .map(|(sq, mean)| (sq / n - mean * mean).max(0.0).sqrt())
        .collect();

    Ok((means, std_devs))
}

/// Compute the [`ChannelMetrics`] triple for an image.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] for a zero-area image.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn channel_metrics<P>(image: &ImageBuffer<P, Vec<u8>>) -> Result<ChannelMetrics>
where
    P: Pixel<Subpixel = u8>,
{
    let (means, std_devs) = channel_mean_std_dev(image)?;

    let samples = image.as_raw();
    let total: u64 = samples.iter().map(|&v| u64::from(v)).sum();
    let brightness = total as f64 / samples.len() as f64;

    let channels = means.len() as f64;
    let mean_of_means = means.iter().sum::<f64>() / channels;
    let mean_of_spreads = std_devs.iter().sum::<f64>() / channels;

    Ok(ChannelMetrics {
        brightness: brightness as f32,
        mean_of_means: mean_of_means as f32,
        mean_of_spreads: mean_of_spreads as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn uniform_image_has_zero_spread() {
        let img = RgbImage::from_pixel(20, 10, Rgb([150, 150, 150]));
        let m = channel_metrics(&img).unwrap();
        assert!((m.brightness - 150.0).abs() < 1e-4);
        assert!((m.mean_of_means - 150.0).abs() < 1e-4);
        assert!(m.mean_of_spreads.abs() < 1e-4);
    }

    #[test]
    fn per_channel_means_are_averaged() {
        let img = RgbImage::from_pixel(4, 4, Rgb([30, 60, 90]));
        let (means, _) = channel_mean_std_dev(&img).unwrap();
        assert_eq!(means, vec![30.0, 60.0, 90.0]);

        let m = channel_metrics(&img).unwrap();
        assert!((m.brightness - 60.0).abs() < 1e-4);
        assert!((m.mean_of_means - 60.0).abs() < 1e-4);
    }

    #[test]
    fn spread_of_half_black_half_white() {
        // Population stddev of an even 0/200 split is 100.
        let img = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([0]) } else { Luma([200]) });
        let m = channel_metrics(&img).unwrap();
        assert!((m.brightness - 100.0).abs() < 1e-4);
        assert!((m.mean_of_spreads - 100.0).abs() < 1e-3);
    }

    #[test]
    fn zero_area_image_is_rejected() {
        let img = RgbImage::new(0, 12);
        let err = channel_metrics(&img).unwrap_err();
        assert!(matches!(err, Error::InvalidImage { stage: "statistics", .. }));
    }
}
