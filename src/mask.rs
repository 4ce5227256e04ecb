//! Per-template mask construction and aggregation.
//!
//! Mask convention: 255 marks pixels to remove, 0 pixels to preserve.

use image::{GrayImage, RgbImage};

use crate::error::{Error, Result};
use crate::foreground::extract_foreground;
use crate::gravity::{align_to_canvas, crop_with_gravity, GeometryClamp, Gravity};
use crate::threshold::binarize;

/// Everything computed for one template.
///
/// Only `final_mask` feeds aggregation; the other layers are kept for
/// inspection.
#[derive(Debug, Clone)]
pub struct MaskLayers {
    /// Template cropped and aligned to the image.
    pub cropped_template: GrayImage,
    /// Image binarized at the adaptive threshold.
    pub binarized: RgbImage,
    /// Foreground silhouette (0 = foreground).
    pub foreground: GrayImage,
    /// Mask this template contributes.
    pub final_mask: GrayImage,
    /// Clamps applied while cropping the template.
    pub clamps: Vec<GeometryClamp>,
}

/// Build the removal mask for one template against a normalized image.
///
/// With `exclude_foreground`, pixels classified as foreground are dropped
/// from the template so text under the stamp survives.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] if the image or template has zero area.
pub fn compute_watermark_mask(
    image: &RgbImage,
    template: &GrayImage,
    gravity: Gravity,
    threshold: f32,
    exclude_foreground: bool,
) -> Result<MaskLayers> {
    let (w, h) = image.dimensions();
    let (crop, clamps) = crop_with_gravity(template, w, h, gravity)?;
    for clamp in &clamps {
        tracing::warn!(%gravity, %clamp, "template smaller than image");
    }
    let cropped_template = align_to_canvas(crop, w, h, gravity);

    let binarized = binarize(image, threshold);
    let foreground = extract_foreground(&binarized);

    let final_mask = if exclude_foreground {
        bitwise_and(&cropped_template, &foreground)?
    } else {
        cropped_template.clone()
    };

    Ok(MaskLayers {
        cropped_template,
        binarized,
        foreground,
        final_mask,
        clamps,
    })
}

fn check_same_size(a: &GrayImage, b: &GrayImage) -> Result<()> {
    if a.dimensions() == b.dimensions() {
        Ok(())
    } else {
        Err(Error::invalid_image(
            "mask composition",
            format!(
                "mask sizes differ ({}x{} vs {}x{})",
                a.width(),
                a.height(),
                b.width(),
                b.height()
            ),
        ))
    }
}

/// Pixel-wise AND of two equally sized masks.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] if the sizes differ.
pub fn bitwise_and(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    check_same_size(a, b)?;
    let mut out = a.clone();
    for (o, v) in out.iter_mut().zip(b.iter()) {
        *o &= *v;
    }
    Ok(out)
}

/// OR `mask` into the running composite in place.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] if the sizes differ.
pub fn accumulate(composite: &mut GrayImage, mask: &GrayImage) -> Result<()> {
    check_same_size(composite, mask)?;
    for (o, v) in composite.iter_mut().zip(mask.iter()) {
        *o |= *v;
    }
    Ok(())
}

/// Union of all masks over an all-zero `width x height` start.
///
/// Order does not matter; no masks gives an all-zero mask.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] if any mask has a different size.
pub fn aggregate_masks<'a, I>(width: u32, height: u32, masks: I) -> Result<GrayImage>
where
    I: IntoIterator<Item = &'a GrayImage>,
{
    let mut composite = GrayImage::new(width, height);
    for mask in masks {
        accumulate(&mut composite, mask)?;
    }
    Ok(composite)
}
