use std::time::Instant;

use panokit_image::{Image, ImageFrame, ImageSize, PixelFormat};
use rayon::prelude::*;

use crate::camera::CameraParams;
use crate::compositor::{composite, into_frame, plan_canvas};
use crate::config::StitchConfig;
use crate::error::{StitchError, StitchStage};
use crate::estimator::estimate_cameras;
use crate::ingest::ingest;
use crate::matcher::{build_match_graph, find_features, registration_scale};
use crate::warper::{WarpedView, Warper};
use crate::wave::wave_correct;

/// Successful result of [`Stitcher::stitch_detailed`].
#[derive(Debug, Clone)]
pub struct Panorama {
    /// The composed panorama.
    pub image: ImageFrame,
    /// Final camera of every frame that made it into the panorama.
    pub cameras: Vec<CameraParams>,
    /// Input indices of those frames, ascending and aligned with `cameras`.
    pub frame_indices: Vec<usize>,
}

/// Panorama stitching pipeline.
///
/// The stitcher only holds its configuration; every intermediate result lives inside a single
/// call, so one instance can serve many calls, also from several threads.
///
/// # Examples
///
/// ```
/// use panokit_image::{ImageFrame, PixelFormat};
/// use panokit_stitching::{StitchConfig, StitchError, StitchStatus, Stitcher};
///
/// let stitcher = Stitcher::new(StitchConfig::default());
/// let frame = ImageFrame::new([4, 4].into(), PixelFormat::Gray8, vec![0; 16]).unwrap();
///
/// let result = stitcher.stitch(&[frame]);
/// assert!(matches!(result, Err(StitchError::NotEnoughImages(1))));
/// assert_eq!(StitchStatus::of(&result), StitchStatus::ErrorInput);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Stitcher {
    config: StitchConfig,
}

impl Stitcher {
    /// Create a stitcher with the given configuration.
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    /// The configuration used by every call.
    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Stitch an ordered sequence of overlapping frames into one panorama.
    ///
    /// # Errors
    ///
    /// See [`StitchError::status`] for the mapping of errors to caller-facing statuses.
    pub fn stitch(&self, frames: &[ImageFrame]) -> Result<ImageFrame, StitchError> {
        self.stitch_detailed(frames).map(|pano| pano.image)
    }

    /// Like [`Stitcher::stitch`] but also returns the estimated cameras.
    pub fn stitch_detailed(&self, frames: &[ImageFrame]) -> Result<Panorama, StitchError> {
        let start = Instant::now();
        let mut stage = StitchStage::Idle;

        let result = self.run(frames, &mut stage);

        match &result {
            Ok(pano) => log::info!(
                "{} -> {}: {}x{} panorama from {} of {} frames in {:?}",
                stage,
                StitchStage::Done,
                pano.image.width(),
                pano.image.height(),
                pano.frame_indices.len(),
                frames.len(),
                start.elapsed()
            ),
            Err(e) => log::warn!(
                "{} -> {}: failed with {:?}: {e}",
                stage,
                StitchStage::Done,
                e.status()
            ),
        }
        result
    }

    fn run(&self, frames: &[ImageFrame], stage: &mut StitchStage) -> Result<Panorama, StitchError> {
        let config = &self.config;
        let mut enter = |next: StitchStage| {
            log::info!("{} -> {}", stage, next);
            *stage = next;
        };

        enter(StitchStage::Ingesting);
        config.validate()?;
        let ingested = ingest(frames)?;
        let sizes: Vec<ImageSize> = ingested.frames.iter().map(|f| f.size()).collect();

        enter(StitchStage::FeatureMatching);
        let scale = registration_scale(&sizes, config.registration_resolution_mpx);
        let features = find_features(&ingested.frames, scale, &config.features)?;
        let graph = build_match_graph(&features, &config.matcher)?;

        enter(StitchStage::Estimating);
        let mut estimate = estimate_cameras(&graph, &features, &sizes, config)?;

        if config.wave_correction {
            enter(StitchStage::WaveCorrecting);
            wave_correct(&mut estimate.cameras);
        }

        enter(StitchStage::Blending);
        let mut focals: Vec<f64> = estimate.cameras.iter().map(|c| c.focal).collect();
        focals.sort_by(f64::total_cmp);
        let warper = Warper::new(config.projection, focals[focals.len() / 2]);

        let rois: Vec<_> = estimate
            .frame_indices
            .iter()
            .zip(estimate.cameras.iter())
            .map(|(&i, cam)| warper.warp_roi(cam, sizes[i]))
            .collect();
        let canvas = plan_canvas(&rois, config.max_canvas_pixels)?;
        log::debug!(
            "canvas {}x{} at ({}, {})",
            canvas.width,
            canvas.height,
            canvas.x,
            canvas.y
        );

        let views: Vec<WarpedView> = estimate
            .frame_indices
            .par_iter()
            .zip(estimate.cameras.par_iter())
            .map(|(&i, cam)| {
                let frame = &ingested.frames[i];
                let color: Image<f32, 3> = frame.to_rgb8()?.cast()?;
                let mask = frame.alpha_mask()?;
                warper.warp(&color, &mask, cam)
            })
            .collect::<Result<Vec<_>, StitchError>>()?
            .into_iter()
            .flatten()
            .collect();

        let blended = composite(views, &canvas, config)?;
        let format = match ingested.format {
            PixelFormat::Rgba8 => PixelFormat::Rgba8,
            _ => PixelFormat::Rgb8,
        };
        let image = into_frame(&blended, format)?;

        Ok(Panorama {
            image,
            cameras: estimate.cameras,
            frame_indices: estimate.frame_indices,
        })
    }
}

/// Stitch `frames` with `config`, see [`Stitcher::stitch`].
pub fn stitch(frames: &[ImageFrame], config: &StitchConfig) -> Result<ImageFrame, StitchError> {
    Stitcher::new(*config).stitch(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StitchStatus;

    #[test]
    fn invalid_config_is_input_error() {
        let frame = ImageFrame::new([8, 8].into(), PixelFormat::Rgb8, vec![0; 192]).unwrap();
        let config = StitchConfig {
            blending_strength: 101.0,
            ..Default::default()
        };
        let result = stitch(&[frame.clone(), frame], &config);
        assert_eq!(StitchStatus::of(&result), StitchStatus::ErrorInput);
    }

    #[test]
    fn featureless_frames_fail_stitching() {
        let frame = ImageFrame::new([64, 48].into(), PixelFormat::Gray8, vec![90; 64 * 48]).unwrap();
        let result = Stitcher::default().stitch(&[frame.clone(), frame]);
        assert!(matches!(result, Err(StitchError::NoMatches(_))));
        assert_eq!(StitchStatus::of(&result), StitchStatus::ErrorStitching);
    }
}
