//! Gravity-anchored template cropping.
//!
//! A template is cut down to the source image size with its origin chosen so
//! the crop touches the edges named by the anchor:
//!
//! ```text
//!  north-west   north    north-east
//!     west      center      east
//!  south-west   south    south-east
//! ```
//!
//! Axes the anchor does not name start at 0, so `north` crops from the
//! top-left corner and `east` from the top-right one. `center` centers both.

use std::fmt;
use std::str::FromStr;

use image::{imageops, GrayImage, ImageBuffer, Pixel};

use crate::error::{Error, Result};

/// Anchor position of a watermark stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gravity {
    /// Top edge.
    North,
    /// Bottom edge.
    South,
    /// Right edge.
    East,
    /// Left edge.
    West,
    /// Top-right corner.
    NorthEast,
    /// Top-left corner.
    NorthWest,
    /// Bottom-right corner.
    SouthEast,
    /// Bottom-left corner.
    SouthWest,
    /// Centered on both axes.
    Center,
}

/// Where a crop sits along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Start,
    Middle,
    End,
}

impl Gravity {
    /// All anchors, in compass order.
    pub const ALL: [Gravity; 9] = [
        Gravity::NorthWest,
        Gravity::North,
        Gravity::NorthEast,
        Gravity::West,
        Gravity::Center,
        Gravity::East,
        Gravity::SouthWest,
        Gravity::South,
        Gravity::SouthEast,
    ];

    /// Canonical config name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
            Self::NorthEast => "north-east",
            Self::NorthWest => "north-west",
            Self::SouthEast => "south-east",
            Self::SouthWest => "south-west",
            Self::Center => "center",
        }
    }

    fn horizontal(self) -> Align {
        match self {
            Self::East | Self::NorthEast | Self::SouthEast => Align::End,
            Self::Center => Align::Middle,
            _ => Align::Start,
        }
    }

    fn vertical(self) -> Align {
        match self {
            Self::South | Self::SouthEast | Self::SouthWest => Align::End,
            Self::Center => Align::Middle,
            _ => Align::Start,
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gravity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "north" => Ok(Self::North),
            "south" => Ok(Self::South),
            "east" => Ok(Self::East),
            "west" => Ok(Self::West),
            "northeast" => Ok(Self::NorthEast),
            "northwest" => Ok(Self::NorthWest),
            "southeast" => Ok(Self::SouthEast),
            "southwest" => Ok(Self::SouthWest),
            "center" | "centre" => Ok(Self::Center),
            _ => Err(Error::InvalidConfiguration(format!("unknown gravity {s:?}"))),
        }
    }
}

/// Axis of a clamped crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Width.
    Horizontal,
    /// Height.
    Vertical,
}

/// A requested crop extent that did not fit the template.
///
/// Not an error: the crop shrinks to the template's full extent and the run
/// continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryClamp {
    /// Axis that was shrunk.
    pub axis: Axis,
    /// Extent asked for.
    pub requested: u32,
    /// Extent actually produced (the template's extent on that axis).
    pub granted: u32,
}

impl fmt::Display for GeometryClamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = match self.axis {
            Axis::Horizontal => "width",
            Axis::Vertical => "height",
        };
        write!(f, "{axis} clamped from {} to {}", self.requested, self.granted)
    }
}

/// Start offset and extent along one axis, plus whether it had to shrink.
fn place(extent: u32, requested: u32, align: Align) -> (u32, u32, bool) {
    if requested > extent {
        return (0, extent, true);
    }
    let start = match align {
        Align::Start => 0,
        Align::Middle => (extent - requested) / 2,
        Align::End => extent - requested,
    };
    (start, requested, false)
}

/// Crop `image` to `width x height` anchored at `gravity`.
///
/// Returns an owned image plus any clamps applied. The output never exceeds
/// the template's dimensions.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] if the template or the requested size has
/// zero area.
pub fn crop_with_gravity<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    width: u32,
    height: u32,
    gravity: Gravity,
) -> Result<(ImageBuffer<P, Vec<u8>>, Vec<GeometryClamp>)>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (img_w, img_h) = image.dimensions();
    if img_w == 0 || img_h == 0 {
        return Err(Error::invalid_image(
            "gravity crop",
            format!("template has zero area ({img_w}x{img_h})"),
        ));
    }
    if width == 0 || height == 0 {
        return Err(Error::invalid_image(
            "gravity crop",
            format!("requested crop has zero area ({width}x{height})"),
        ));
    }

    let (x, w, clamped_w) = place(img_w, width, gravity.horizontal());
    let (y, h, clamped_h) = place(img_h, height, gravity.vertical());

    let mut clamps = Vec::new();
    if clamped_w {
        clamps.push(GeometryClamp {
            axis: Axis::Horizontal,
            requested: width,
            granted: w,
        });
    }
    if clamped_h {
        clamps.push(GeometryClamp {
            axis: Axis::Vertical,
            requested: height,
            granted: h,
        });
    }

    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    Ok((cropped, clamps))
}

/// Place a mask onto an all-zero canvas of `width x height` at `gravity`.
///
/// Used when a template is smaller than the source image so the mask still
/// covers the whole image. A mask that already matches is returned as is.
#[must_use]
pub fn align_to_canvas(mask: GrayImage, width: u32, height: u32, gravity: Gravity) -> GrayImage {
    if mask.dimensions() == (width, height) {
        return mask;
    }

    let (x, _, _) = place(width, mask.width(), gravity.horizontal());
    let (y, _, _) = place(height, mask.height(), gravity.vertical());

    let mut canvas = GrayImage::new(width, height);
    imageops::replace(&mut canvas, &mask, i64::from(x), i64::from(y));
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn coords(w: u32, h: u32) -> GrayImage {
        // Encodes position so crops can be located.
        GrayImage::from_fn(w, h, |x, y| Luma([u8::try_from(y * 10 + x).unwrap()]))
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("north".parse::<Gravity>().unwrap(), Gravity::North);
        assert_eq!("South-East".parse::<Gravity>().unwrap(), Gravity::SouthEast);
        assert_eq!("south_west".parse::<Gravity>().unwrap(), Gravity::SouthWest);
        assert_eq!("northeast".parse::<Gravity>().unwrap(), Gravity::NorthEast);
        assert_eq!("centre".parse::<Gravity>().unwrap(), Gravity::Center);
        for g in Gravity::ALL {
            assert_eq!(g.as_str().parse::<Gravity>().unwrap(), g);
        }
    }

    #[test]
    fn unknown_gravity_is_a_configuration_error() {
        let err = "upwards".parse::<Gravity>().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn south_east_touches_bottom_right() {
        let tpl = coords(10, 8);
        let (crop, clamps) = crop_with_gravity(&tpl, 4, 3, Gravity::SouthEast).unwrap();
        assert!(clamps.is_empty());
        assert_eq!(crop.dimensions(), (4, 3));
        assert_eq!(crop.get_pixel(0, 0)[0], 56); // (6, 5)
        assert_eq!(crop.get_pixel(3, 2)[0], 79); // (9, 7)
    }

    #[test]
    fn north_and_west_start_at_origin() {
        let tpl = coords(10, 8);
        for g in [Gravity::North, Gravity::NorthWest, Gravity::West] {
            let (crop, _) = crop_with_gravity(&tpl, 4, 3, g).unwrap();
            assert_eq!(crop.get_pixel(0, 0)[0], 0, "{g}");
        }
    }

    #[test]
    fn south_keeps_left_edge() {
        let tpl = coords(10, 8);
        let (crop, _) = crop_with_gravity(&tpl, 4, 3, Gravity::South).unwrap();
        assert_eq!(crop.get_pixel(0, 0)[0], 50); // (0, 5)
    }

    #[test]
    fn east_keeps_top_edge() {
        let tpl = coords(10, 8);
        let (crop, _) = crop_with_gravity(&tpl, 4, 3, Gravity::East).unwrap();
        assert_eq!(crop.get_pixel(0, 0)[0], 6); // (6, 0)
    }

    #[test]
    fn center_is_centered() {
        let tpl = coords(10, 8);
        let (crop, _) = crop_with_gravity(&tpl, 4, 4, Gravity::Center).unwrap();
        assert_eq!(crop.get_pixel(0, 0)[0], 23); // (3, 2)
    }

    #[test]
    fn oversized_request_is_clamped() {
        let tpl = coords(10, 8);
        let (crop, clamps) = crop_with_gravity(&tpl, 25, 3, Gravity::SouthEast).unwrap();
        assert_eq!(crop.dimensions(), (10, 3));
        assert_eq!(
            clamps,
            vec![GeometryClamp {
                axis: Axis::Horizontal,
                requested: 25,
                granted: 10,
            }]
        );
        assert_eq!(crop.get_pixel(0, 0)[0], 50);
    }

    #[test]
    fn output_never_exceeds_template() {
        let tpl = coords(7, 5);
        for g in Gravity::ALL {
            for (w, h) in [(1, 1), (7, 5), (8, 5), (7, 6), (20, 20), (3, 9)] {
                let (crop, clamps) = crop_with_gravity(&tpl, w, h, g).unwrap();
                let (cw, ch) = crop.dimensions();
                assert!(cw <= 7 && ch <= 5);
                assert_eq!(cw, if w > 7 { 7 } else { w });
                assert_eq!(ch, if h > 5 { 5 } else { h });
                assert_eq!(clamps.len(), usize::from(w > 7) + usize::from(h > 5));
            }
        }
    }

    #[test]
    fn zero_area_template_is_rejected() {
        let tpl = GrayImage::new(0, 4);
        assert!(matches!(
            crop_with_gravity(&tpl, 2, 2, Gravity::North),
            Err(Error::InvalidImage { .. })
        ));
    }

    #[test]
    fn small_mask_is_aligned_on_canvas() {
        let mask = GrayImage::from_pixel(2, 2, Luma([255]));
        let canvas = align_to_canvas(mask, 6, 4, Gravity::SouthEast);
        assert_eq!(canvas.dimensions(), (6, 4));
        assert_eq!(canvas.get_pixel(5, 3)[0], 255);
        assert_eq!(canvas.get_pixel(4, 2)[0], 255);
        assert_eq!(canvas.get_pixel(3, 3)[0], 0);
        assert_eq!(canvas.pixels().filter(|p| p[0] == 255).count(), 4);
    }

    #[test]
    fn matching_mask_is_untouched() {
        let mask = coords(6, 4);
        let aligned = align_to_canvas(mask.clone(), 6, 4, Gravity::Center);
        assert_eq!(aligned, mask);
    }
}
