use crate::parallel;
use panokit_image::{Image, ImageError, ImageFrame, PixelFormat};

/// Luma of an 8-bit RGB image with BT.601 weights in 8-bit fixed point.
///
/// `Y = (77 R + 150 G + 29 B) >> 8`
///
/// # Errors
///
/// `src` and `dst` must have the same size.
pub fn gray_from_rgb_u8(src: &Image<u8, 3>, dst: &mut Image<u8, 1>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |rgb, y| {
        let [r, g, b] = [rgb[0], rgb[1], rgb[2]].map(u32::from);
        y[0] = ((77 * r + 150 * g + 29 * b) >> 8) as u8;
    });

    Ok(())
}

/// Luma of a frame of any [`PixelFormat`], ignoring alpha.
///
/// # Example
///
/// ```
/// use panokit_image::{ImageFrame, PixelFormat};
/// use panokit_imgproc::color::gray_from_frame;
///
/// let frame = ImageFrame::new([2, 1].into(), PixelFormat::Rgb8, vec![255, 255, 255, 0, 0, 0])
///     .unwrap();
/// assert_eq!(gray_from_frame(&frame).unwrap().as_slice(), &[255, 0]);
/// ```
pub fn gray_from_frame(frame: &ImageFrame) -> Result<Image<u8, 1>, ImageError> {
    let bytes = frame.as_bytes();
    match frame.format() {
        PixelFormat::Gray8 => Image::new(frame.size(), bytes.to_vec()),
        PixelFormat::GrayAlpha8 => Image::new(frame.size(), bytes.iter().step_by(2).copied().collect()),
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
            let rgb = frame.to_rgb8()?;
            let mut gray = Image::from_size_val(frame.size(), 0u8)?;
            gray_from_rgb_u8(&rgb, &mut gray)?;
            Ok(gray)
        }
    }
}
