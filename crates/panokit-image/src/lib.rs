#![deny(missing_docs)]
//! Image types and traits for generating and manipulating images

/// image representation for computer vision purposes.
pub mod image;

/// Error types for the image module.
pub mod error;

/// dynamically typed frames exchanged at the pipeline boundary.
pub mod frame;

pub use crate::error::ImageError;
pub use crate::frame::{ImageFrame, PixelFormat};
pub use crate::image::{Image, ImageDtype, ImageSize};
