//! Color classification and grayscale reduction.

use image::{Rgb, RgbImage};
use palette::{FromColor, Hsv, Srgb};

/// Lower bound (on a 0-255 scale) for both saturation and value of a vivid pixel.
const VIVID_LOW_BOUND: u8 = 32;

/// Luminance of an RGB pixel: `0.299*R + 0.587*G + 0.114*B`, rounded.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luminance(px: Rgb<u8>) -> u8 {
    let y = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
    y.round().clamp(0.0, 255.0) as u8
}

/// Quantize a unit-range HSV component to 8 bits.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(component: f32) -> u8 {
    (component * 255.0).round().clamp(0.0, 255.0) as u8
}

// The band is compared on 8-bit HSV, so S = 32/255 exactly is inside it.
fn is_vivid(px: Rgb<u8>) -> bool {
    let rgb = Srgb::new(px[0], px[1], px[2]).into_format::<f32>();
    let hsv: Hsv = Hsv::from_color(rgb);
    to_u8(hsv.saturation) >= VIVID_LOW_BOUND && to_u8(hsv.value) >= VIVID_LOW_BOUND
}

/// Whether any pixel carries meaningful chroma.
///
/// A pixel counts when its HSV saturation and value both reach the vivid
/// band, whatever its hue.
#[must_use]
pub fn has_color(image: &RgbImage) -> bool {
    image.pixels().any(|px| is_vivid(*px))
}

/// Collapse to luminance, keeping three identical channels.
///
/// Idempotent: an image whose channels are already equal comes back unchanged.
#[must_use]
pub fn remove_colors(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let y = luminance(*px);
        *px = Rgb([y, y, y]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_weights() {
        assert_eq!(luminance(Rgb([0, 0, 0])), 0);
        assert_eq!(luminance(Rgb([255, 255, 255])), 255);
        assert_eq!(luminance(Rgb([255, 0, 0])), 76);
        assert_eq!(luminance(Rgb([0, 255, 0])), 150);
        assert_eq!(luminance(Rgb([0, 0, 255])), 29);
    }

    #[test]
    fn gray_scan_has_no_color() {
        let img = RgbImage::from_fn(16, 16, |x, y| {
            let v = u8::try_from((x * 16 + y) % 256).unwrap();
            Rgb([v, v, v])
        });
        assert!(!has_color(&img));
    }

    #[test]
    fn single_red_stamp_pixel_is_color() {
        let mut img = RgbImage::from_pixel(16, 16, Rgb([240, 240, 240]));
        img.put_pixel(3, 4, Rgb([200, 30, 30]));
        assert!(has_color(&img));
    }

    #[test]
    fn dark_saturated_pixels_are_not_vivid() {
        // Fully saturated but value below the band.
        let img = RgbImage::from_pixel(4, 4, Rgb([20, 0, 0]));
        assert!(!has_color(&img));
    }

    #[test]
    fn faint_tint_is_not_vivid() {
        // Saturation ~ 10/255.
        let img = RgbImage::from_pixel(4, 4, Rgb([250, 245, 240]));
        assert!(!has_color(&img));
    }

    #[test]
    fn band_edges_are_inclusive_on_eight_bits() {
        // S = 32 exactly.
        assert!(is_vivid(Rgb([255, 223, 223])));
        // S = 31.875, which rounds to 32.
        assert!(is_vivid(Rgb([40, 35, 35])));
        // V = 32 exactly.
        assert!(is_vivid(Rgb([32, 0, 0])));

        assert!(!is_vivid(Rgb([255, 224, 224])));
        assert!(!is_vivid(Rgb([31, 0, 0])));
    }

    #[test]
    fn one_boundary_pixel_makes_the_page_color() {
        let mut img = RgbImage::from_pixel(8, 8, Rgb([230, 230, 230]));
        img.put_pixel(7, 7, Rgb([255, 223, 223]));
        assert!(has_color(&img));
    }

    #[test]
    fn remove_colors_is_idempotent() {
        let img = RgbImage::from_fn(10, 10, |x, y| {
            Rgb([
                u8::try_from(x * 20).unwrap(),
                u8::try_from(y * 25).unwrap(),
                100,
            ])
        });
        let once = remove_colors(&img);
        let twice = remove_colors(&once);
        assert_eq!(once, twice);
        assert_eq!(once.dimensions(), img.dimensions());
        for px in once.pixels() {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }
}
