//! Pixel interpolation methods for image transformations.
//!
//! Used when resampling images during resizing and when warping views onto the panorama
//! surface.

mod bilinear;
mod interpolate;
mod nearest;
mod remap;

pub use interpolate::{interpolate_pixel, InterpolationMode};
pub use remap::remap;
