//! Filling masked pixels from their surroundings.
//!
//! The pipeline only depends on the [`Inpaint`] contract. [`Telea`] adapts the
//! fast-marching fill from the `inpaint` crate.

use ::inpaint::ImageInpaint;
use image::{GrayImage, RgbImage};

use crate::error::{Error, Result};

/// Neighbourhood radius used when none is configured.
pub const DEFAULT_INPAINT_RADIUS: u32 = 3;

/// Fill the pixels of `image` where `mask` is non-zero.
///
/// Implementations must leave every pixel with `mask == 0` untouched.
pub trait Inpaint {
    /// Return a filled copy of `image`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidImage`] if image and mask sizes differ.
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32) -> Result<RgbImage>;
}

/// Fast-marching inpainting after Telea (2004).
#[derive(Debug, Clone, Copy, Default)]
pub struct Telea;

impl Inpaint for Telea {
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32) -> Result<RgbImage> {
        if image.dimensions() != mask.dimensions() {
            return Err(Error::invalid_image(
                "inpaint",
                format!(
                    "image is {}x{} but mask is {}x{}",
                    image.width(),
                    image.height(),
                    mask.width(),
                    mask.height()
                ),
            ));
        }

        // Nothing to fill, or nothing to fill from.
        let masked = mask.iter().filter(|&&v| v != 0).count();
        if masked == 0 || masked == mask.len() {
            return Ok(image.clone());
        }

        let radius = i32::try_from(radius).map_err(|_| {
            Error::InvalidConfiguration(format!("inpaint radius {radius} is out of range"))
        })?;

        let mut out = image.clone();
        out.telea_inpaint(mask, radius)?;
        Ok(out)
    }
}
