#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// feather blending around seams.
pub mod blender;

/// bundle adjustment of focal lengths and rotations.
pub mod bundle;

/// camera intrinsics and orientation.
pub mod camera;

/// canvas planning and composition.
pub mod compositor;

/// stitching configuration.
pub mod config;

/// conversions from and to host image types.
pub mod convert;

/// error and status types.
pub mod error;

/// camera estimation from the match graph.
pub mod estimator;

/// exposure compensation.
pub mod exposure;

/// robust homography estimation.
pub mod homography;

/// input validation.
pub mod ingest;

/// feature detection and pairwise matching.
pub mod matcher;

/// seam finding.
pub mod seam;

mod stitcher;

/// projection onto the panorama surface.
pub mod warper;

/// horizon straightening.
pub mod wave;

pub use crate::camera::CameraParams;
pub use crate::config::{
    BundleAdjustConfig, ComponentPolicy, FeatureConfig, MatcherConfig, Projection, StitchConfig,
};
pub use crate::convert::{is_sharp_host, ConversionError, HostBitmap, HostImage, HostLayout};
pub use crate::error::{StitchError, StitchStage, StitchStatus};
pub use crate::homography::RansacParams;
pub use crate::matcher::{MatchGraph, MatchesInfo};
pub use crate::stitcher::{stitch, Panorama, Stitcher};
