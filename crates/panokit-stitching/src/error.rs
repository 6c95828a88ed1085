use panokit_image::ImageError;
use panokit_imgproc::features::FeatureError;

/// Outcome of a stitch call as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StitchStatus {
    /// A panorama was produced.
    Success,
    /// The caller supplied insufficient or malformed images or configuration.
    ErrorInput,
    /// The pipeline ran but could not produce a coherent panorama.
    ErrorStitching,
}

impl StitchStatus {
    /// Status of a stitch result.
    pub fn of<T>(result: &Result<T, StitchError>) -> Self {
        match result {
            Ok(_) => StitchStatus::Success,
            Err(e) => e.status(),
        }
    }
}

/// Pipeline stages of a single stitch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StitchStage {
    /// Nothing started yet.
    Idle,
    /// Validating and normalizing the input frames.
    Ingesting,
    /// Detecting features and matching frame pairs.
    FeatureMatching,
    /// Selecting the panorama component and estimating cameras.
    Estimating,
    /// Straightening the horizon.
    WaveCorrecting,
    /// Warping, seam finding and blending onto the canvas.
    Blending,
    /// Terminal state.
    Done,
}

impl std::fmt::Display for StitchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StitchStage::Idle => "idle",
            StitchStage::Ingesting => "ingesting",
            StitchStage::FeatureMatching => "feature matching",
            StitchStage::Estimating => "estimating",
            StitchStage::WaveCorrecting => "wave correcting",
            StitchStage::Blending => "blending",
            StitchStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors returned by the stitching pipeline.
#[derive(thiserror::Error, Debug)]
pub enum StitchError {
    /// Fewer than two frames were supplied.
    #[error("need at least 2 images, got {0}")]
    NotEnoughImages(usize),

    /// A frame could not be ingested.
    #[error("image {index} is invalid: {source}")]
    InvalidImage {
        /// Position of the frame in the input sequence.
        index: usize,
        /// Why the frame was rejected.
        #[source]
        source: ImageError,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No frame pair passed the matching threshold.
    #[error("no pair of images matches with confidence above {0}")]
    NoMatches(f64),

    /// The panorama component is too small.
    #[error("largest connected component has {0} image(s), need at least 2")]
    ComponentTooSmall(usize),

    /// Some frames fell outside the panorama while all of them were required.
    #[error("images {0:?} could not be connected to the panorama")]
    FramesDropped(Vec<usize>),

    /// Camera estimation produced an unusable geometry.
    #[error("camera estimation failed: {0}")]
    Estimation(String),

    /// The output canvas would exceed the pixel budget.
    #[error("canvas of {width}x{height} exceeds the limit of {max} pixels")]
    CanvasTooLarge {
        /// Canvas width in pixels.
        width: usize,
        /// Canvas height in pixels.
        height: usize,
        /// Configured maximum number of pixels.
        max: usize,
    },

    /// Every warped frame has an empty footprint.
    #[error("every warped image has an empty footprint")]
    DegenerateCanvas,

    /// An image operation failed inside the pipeline.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The feature pipeline failed.
    #[error(transparent)]
    Feature(#[from] FeatureError),
}

impl StitchError {
    /// The status reported to the caller for this error.
    pub fn status(&self) -> StitchStatus {
        match self {
            StitchError::NotEnoughImages(_)
            | StitchError::InvalidImage { .. }
            | StitchError::InvalidConfig(_) => StitchStatus::ErrorInput,
            StitchError::Feature(FeatureError::InvalidArcLength(_))
            | StitchError::Feature(FeatureError::InvalidSigma(_)) => StitchStatus::ErrorInput,
            StitchError::NoMatches(_)
            | StitchError::ComponentTooSmall(_)
            | StitchError::FramesDropped(_)
            | StitchError::Estimation(_)
            | StitchError::CanvasTooLarge { .. }
            | StitchError::DegenerateCanvas
            | StitchError::Image(_)
            | StitchError::Feature(_) => StitchStatus::ErrorStitching,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            StitchError::NotEnoughImages(1).status(),
            StitchStatus::ErrorInput
        );
        assert_eq!(
            StitchError::InvalidImage {
                index: 0,
                source: ImageError::EmptyImage(0, 4)
            }
            .status(),
            StitchStatus::ErrorInput
        );
        assert_eq!(
            StitchError::NoMatches(0.3).status(),
            StitchStatus::ErrorStitching
        );
        assert_eq!(
            StitchError::Feature(FeatureError::InvalidSigma(-1.0)).status(),
            StitchStatus::ErrorInput
        );
        assert_eq!(
            StitchError::from(ImageError::CastError).status(),
            StitchStatus::ErrorStitching
        );
    }

    #[test]
    fn status_of_result() {
        let ok: Result<(), StitchError> = Ok(());
        assert_eq!(StitchStatus::of(&ok), StitchStatus::Success);
        let err: Result<(), StitchError> = Err(StitchError::DegenerateCanvas);
        assert_eq!(StitchStatus::of(&err), StitchStatus::ErrorStitching);
    }

    #[test]
    fn error_messages() {
        let e = StitchError::CanvasTooLarge {
            width: 10,
            height: 20,
            max: 100,
        };
        assert_eq!(e.to_string(), "canvas of 10x20 exceeds the limit of 100 pixels");
        assert_eq!(StitchStage::FeatureMatching.to_string(), "feature matching");
    }
}
