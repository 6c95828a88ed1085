use crate::error::StitchError;
use crate::homography::RansacParams;

/// Surface the views are projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Projection {
    /// Flat image plane. Only suitable for narrow fields of view.
    Plane,
    /// Cylinder around the vertical axis.
    Cylindrical,
    /// Unit sphere, longitude and latitude.
    #[default]
    Spherical,
}

/// What to do with frames that do not end up in the panorama component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentPolicy {
    /// Stitch the largest connected component and drop the other frames.
    #[default]
    LargestComponent,
    /// Fail unless every frame is connected.
    RequireAll,
}

/// Keypoint detection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct FeatureConfig {
    /// Maximum number of keypoints per frame.
    pub max_keypoints: usize,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// FAST contiguous arc length.
    pub fast_arc_length: u8,
    /// Smoothing applied before computing descriptors.
    pub blur_sigma: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_keypoints: 500,
            fast_threshold: 20,
            fast_arc_length: 9,
            blur_sigma: 2.0,
        }
    }
}

/// Pairwise matching settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MatcherConfig {
    /// Lowe ratio between best and second best descriptor distance.
    pub ratio: f32,
    /// Keep only mutual nearest neighbours.
    pub cross_check: bool,
    /// Minimum number of homography inliers for a pair to be kept.
    pub min_inliers: usize,
    /// Minimum pair confidence for an edge to enter the match graph.
    pub match_confidence: f64,
    /// Only match frames whose indices differ by less than this, `None` matches all pairs.
    pub range_width: Option<usize>,
    /// Robust homography estimation settings.
    pub ransac: RansacParams,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            ratio: 0.8,
            cross_check: true,
            min_inliers: 8,
            match_confidence: 0.3,
            range_width: None,
            ransac: RansacParams::default(),
        }
    }
}

/// Levenberg-Marquardt settings of the bundle adjuster.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BundleAdjustConfig {
    /// Maximum number of LM iterations.
    pub max_iterations: usize,
    /// Initial damping factor.
    pub lambda_init: f64,
    /// Stop when the relative cost decrease falls below this value.
    pub eps: f64,
    /// Inlier matches used per edge, evenly subsampled.
    pub max_matches_per_edge: usize,
}

impl Default for BundleAdjustConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            lambda_init: 1e-3,
            eps: 1e-8,
            max_matches_per_edge: 100,
        }
    }
}

/// Settings of one stitch call.
///
/// The value is borrowed for the whole call and never modified by the pipeline.
///
/// # Examples
///
/// ```
/// use panokit_stitching::StitchConfig;
///
/// let config = StitchConfig {
///     blending_strength: 20.0,
///     wave_correction: false,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.pano_confidence_thresh, 0.7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct StitchConfig {
    /// Minimum pair confidence for a frame to join the panorama.
    pub pano_confidence_thresh: f64,
    /// Width of the blend transition in `[0, 100]`, `0` gives a hard seam.
    pub blending_strength: f64,
    /// Straighten the horizon after camera estimation.
    pub wave_correction: bool,
    /// Projection surface of the output.
    pub projection: Projection,
    /// Frames are downscaled to this many megapixels for registration.
    pub registration_resolution_mpx: f64,
    /// Equalize per-frame brightness before blending.
    pub exposure_compensation: bool,
    /// Handling of frames outside the panorama component.
    pub component_policy: ComponentPolicy,
    /// Largest accepted output canvas.
    pub max_canvas_pixels: usize,
    /// Keypoint detection.
    pub features: FeatureConfig,
    /// Pairwise matching.
    pub matcher: MatcherConfig,
    /// Camera refinement.
    pub bundle: BundleAdjustConfig,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            pano_confidence_thresh: 0.7,
            blending_strength: 8.0,
            wave_correction: true,
            projection: Projection::default(),
            registration_resolution_mpx: 0.6,
            exposure_compensation: true,
            component_policy: ComponentPolicy::default(),
            max_canvas_pixels: 50_000_000,
            features: FeatureConfig::default(),
            matcher: MatcherConfig::default(),
            bundle: BundleAdjustConfig::default(),
        }
    }
}

impl StitchConfig {
    /// Check that every value is within its documented range.
    pub fn validate(&self) -> Result<(), StitchError> {
        let invalid = |msg: String| Err(StitchError::InvalidConfig(msg));

        if !(self.pano_confidence_thresh.is_finite() && self.pano_confidence_thresh > 0.0) {
            return invalid(format!(
                "pano_confidence_thresh must be positive, got {}",
                self.pano_confidence_thresh
            ));
        }
        if !(0.0..=100.0).contains(&self.blending_strength) {
            return invalid(format!(
                "blending_strength must be in [0, 100], got {}",
                self.blending_strength
            ));
        }
        if !(self.registration_resolution_mpx > 0.0) {
            return invalid(format!(
                "registration_resolution_mpx must be positive, got {}",
                self.registration_resolution_mpx
            ));
        }
        if self.max_canvas_pixels == 0 {
            return invalid("max_canvas_pixels must be positive".to_string());
        }
        if self.features.max_keypoints == 0 {
            return invalid("max_keypoints must be positive".to_string());
        }
        if !(self.matcher.ratio > 0.0 && self.matcher.ratio <= 1.0) {
            return invalid(format!(
                "matcher ratio must be in (0, 1], got {}",
                self.matcher.ratio
            ));
        }
        if self.matcher.min_inliers < 4 {
            return invalid(format!(
                "min_inliers must be at least 4, got {}",
                self.matcher.min_inliers
            ));
        }
        if self.matcher.range_width == Some(0) {
            return invalid("range_width must be positive".to_string());
        }
        if !(self.matcher.ransac.threshold > 0.0) || self.matcher.ransac.max_iterations == 0 {
            return invalid("ransac threshold and max_iterations must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StitchStatus;

    #[test]
    fn defaults() {
        let config = StitchConfig::default();
        assert_eq!(config.pano_confidence_thresh, 0.7);
        assert_eq!(config.blending_strength, 8.0);
        assert!(config.wave_correction);
        assert_eq!(config.projection, Projection::Spherical);
        assert_eq!(config.component_policy, ComponentPolicy::LargestComponent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let bad = [
            StitchConfig {
                blending_strength: 100.5,
                ..Default::default()
            },
            StitchConfig {
                blending_strength: -1.0,
                ..Default::default()
            },
            StitchConfig {
                pano_confidence_thresh: 0.0,
                ..Default::default()
            },
            StitchConfig {
                registration_resolution_mpx: f64::NAN,
                ..Default::default()
            },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert_eq!(err.status(), StitchStatus::ErrorInput);
        }

        let edge = StitchConfig {
            blending_strength: 0.0,
            ..Default::default()
        };
        assert!(edge.validate().is_ok());
    }
}
