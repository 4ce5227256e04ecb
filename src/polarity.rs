//! Carbon-copy detection and polarity normalization.

use image::{ImageBuffer, Pixel};

/// Brightness below which a scan is treated as inverted (dark background).
pub const CARBON_COPY_THRESHOLD: f32 = 96.0;

/// Replace every sample with its complement (`255 - v`).
#[must_use]
pub fn invert<P>(image: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut out = image.clone();
    for v in out.iter_mut() {
        *v = 255 - *v;
    }
    out
}

/// Bring an image to light-background polarity.
///
/// Returns an owned image in both cases and whether it was inverted. The
/// caller keeps the original untouched.
#[must_use]
pub fn normalize_polarity<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    brightness: f32,
    threshold: f32,
) -> (ImageBuffer<P, Vec<u8>>, bool)
where
    P: Pixel<Subpixel = u8>,
{
    if brightness < threshold {
        (invert(image), true)
    } else {
        (image.clone(), false)
    }
}
