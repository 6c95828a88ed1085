//! Laplacian-variance focus measure.
//!
//! The grayscale image (0..255 scale) is filtered with the 4-neighbour Laplacian and the
//! population variance of the response is used as a sharpness score. Blurry images have
//! few strong second derivatives, hence a small variance.

use panokit_image::{Image, ImageError, ImageFrame};

use crate::{color, filter};

/// Variance of the Laplacian of a grayscale image.
///
/// # Arguments
///
/// * `gray` - The grayscale image in the 0..255 range.
///
/// # Returns
///
/// The population variance of the Laplacian response, `0.0` for an empty image.
pub fn laplacian_variance(gray: &Image<u8, 1>) -> Result<f64, ImageError> {
    if gray.size().is_empty() {
        return Ok(0.0);
    }

    let src = gray.cast::<f32>()?;
    let mut lap = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    filter::laplacian(&src, &mut lap)?;

    let n = lap.as_slice().len() as f64;
    let mean = lap.as_slice().iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = lap
        .as_slice()
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    Ok(var)
}

/// Sharpness score of a frame of any pixel format.
pub fn sharpness_score(frame: &ImageFrame) -> Result<f64, ImageError> {
    let gray = color::gray_from_frame(frame)?;
    laplacian_variance(&gray)
}

/// Whether the Laplacian variance of `frame` exceeds `threshold`.
///
/// There is no universal threshold, the score depends on content and resolution. Smaller
/// thresholds admit blurrier images.
///
/// # Example
///
/// ```
/// use panokit_image::{ImageFrame, PixelFormat};
/// use panokit_imgproc::sharpness::is_sharp;
///
/// let flat = ImageFrame::new([8, 8].into(), PixelFormat::Gray8, vec![128; 64]).unwrap();
/// assert!(!is_sharp(&flat, 100.0).unwrap());
/// ```
pub fn is_sharp(frame: &ImageFrame, threshold: f64) -> Result<bool, ImageError> {
    let score = sharpness_score(frame)?;
    log::debug!("sharpness score {score:.2} (threshold {threshold:.2})");
    Ok(score > threshold)
}
