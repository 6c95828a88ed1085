//! Feature detection, description and matching.
//!
//! - **FAST**: segment test corner detector with non-maximum suppression.
//! - **ORB**: intensity centroid orientation and rotated BRIEF binary descriptors.
//! - **Matching**: brute force Hamming matching with ratio test and cross-check.

use panokit_image::ImageError;

mod fast;
pub use fast::*;

mod orb;
pub use orb::*;

mod r#match;
pub use r#match::*;

/// A detected image feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Column of the feature in pixels.
    pub x: f32,
    /// Row of the feature in pixels.
    pub y: f32,
    /// Detector response, higher is stronger.
    pub response: f32,
    /// Orientation in radians, `0.0` until a descriptor assigns one.
    pub angle: f32,
}

impl Keypoint {
    /// Create an unoriented keypoint.
    pub fn new(x: f32, y: f32, response: f32) -> Self {
        Self {
            x,
            y,
            response,
            angle: 0.0,
        }
    }
}

/// Errors raised by the feature pipeline.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FeatureError {
    /// Underlying image operation failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The FAST arc length must be within `1..=16`.
    #[error("FAST arc length must be in 1..=16, got {0}")]
    InvalidArcLength(u8),

    /// The descriptor smoothing sigma must be positive and finite.
    #[error("smoothing sigma must be positive, got {0}")]
    InvalidSigma(f32),
}
