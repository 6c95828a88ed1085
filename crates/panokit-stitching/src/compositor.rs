//! Canvas planning and composition of the warped views.

use panokit_image::{Image, ImageFrame, PixelFormat};

use crate::blender::{blend, BlendResult};
use crate::config::StitchConfig;
use crate::error::StitchError;
use crate::exposure::{apply_gains, compensate_gains};
use crate::seam::voronoi_seams;
use crate::warper::{Roi, WarpedView};

/// Union of the view footprints, checked against the pixel budget.
///
/// # Errors
///
/// [`StitchError::DegenerateCanvas`] when no view has a footprint, and
/// [`StitchError::CanvasTooLarge`] when the union exceeds `max_pixels`.
pub fn plan_canvas(rois: &[Option<Roi>], max_pixels: usize) -> Result<Roi, StitchError> {
    let canvas = rois
        .iter()
        .flatten()
        .filter(|roi| roi.area() > 0)
        .fold(None, |acc: Option<Roi>, roi| {
            Some(match acc {
                Some(acc) => acc.union(roi),
                None => *roi,
            })
        })
        .ok_or(StitchError::DegenerateCanvas)?;

    if canvas.area() > max_pixels {
        return Err(StitchError::CanvasTooLarge {
            width: canvas.width,
            height: canvas.height,
            max: max_pixels,
        });
    }
    Ok(canvas)
}

/// Exposure compensation, seam finding and blending of views placed on `canvas`.
pub fn composite(
    mut views: Vec<WarpedView>,
    canvas: &Roi,
    config: &StitchConfig,
) -> Result<BlendResult, StitchError> {
    if config.exposure_compensation && views.len() > 1 {
        let gains = compensate_gains(&views);
        apply_gains(&mut views, &gains);
    }

    let seams = voronoi_seams(&views, canvas)?;
    blend(&views, &seams, canvas, config.blending_strength)
}

/// Pack the blended canvas into an output frame.
///
/// [`PixelFormat::Rgba8`] carries the coverage as alpha, any other format gives `Rgb8`.
pub fn into_frame(result: &BlendResult, format: PixelFormat) -> Result<ImageFrame, StitchError> {
    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    let pixels = result.image.as_slice().chunks_exact(3);

    let frame = match format {
        PixelFormat::Rgba8 => {
            let data = pixels
                .zip(result.coverage.as_slice())
                .flat_map(|(px, &a)| [to_u8(px[0]), to_u8(px[1]), to_u8(px[2]), a])
                .collect();
            ImageFrame::from(Image::<u8, 4>::new(result.image.size(), data)?)
        }
        _ => {
            let data = pixels
                .flat_map(|px| [to_u8(px[0]), to_u8(px[1]), to_u8(px[2])])
                .collect();
            ImageFrame::from(Image::<u8, 3>::new(result.image.size(), data)?)
        }
    };
    Ok(frame)
}
