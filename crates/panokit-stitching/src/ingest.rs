//! Input validation and pixel format normalization.

use panokit_image::{ImageFrame, PixelFormat};

use crate::error::StitchError;

/// Frames accepted by the pipeline, all sharing one pixel format.
#[derive(Debug, Clone)]
pub struct IngestedFrames {
    /// Normalized copies of the input frames, in input order.
    pub frames: Vec<ImageFrame>,
    /// Common format, [`PixelFormat::Rgba8`] when any input carries alpha.
    pub format: PixelFormat,
}

/// Validate the input sequence and convert every frame to a common color format.
///
/// # Errors
///
/// Fails with an input error for fewer than two frames or a frame with an empty size.
pub fn ingest(frames: &[ImageFrame]) -> Result<IngestedFrames, StitchError> {
    if frames.len() < 2 {
        return Err(StitchError::NotEnoughImages(frames.len()));
    }

    for (index, frame) in frames.iter().enumerate() {
        if frame.size().is_empty() {
            return Err(StitchError::InvalidImage {
                index,
                source: panokit_image::ImageError::EmptyImage(frame.width(), frame.height()),
            });
        }
    }

    let format = if frames.iter().any(|f| f.format().has_alpha()) {
        PixelFormat::Rgba8
    } else {
        PixelFormat::Rgb8
    };

    let frames = frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let normalized = match format {
                PixelFormat::Rgba8 => frame.to_rgba8().map(ImageFrame::from),
                _ => frame.to_rgb8().map(ImageFrame::from),
            };
            normalized.map_err(|source| StitchError::InvalidImage { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("ingested {} frames as {:?}", frames.len(), format);

    Ok(IngestedFrames { frames, format })
}
