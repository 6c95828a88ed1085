use crate::interpolation::{interpolate_pixel, InterpolationMode};
use crate::parallel;
use panokit_image::{Image, ImageDtype, ImageError, ImageSize};

/// Resample `src` to the size of `dst`.
///
/// Pixel centers are aligned: destination column `x` samples the source at
/// `(x + 0.5) * src_width / dst_width - 0.5`, and likewise for rows.
///
/// # Example
///
/// ```
/// use panokit_image::Image;
/// use panokit_imgproc::interpolation::InterpolationMode;
/// use panokit_imgproc::resize::resize_native;
///
/// let gray = Image::<u8, 1>::from_size_val([640, 480].into(), 90).unwrap();
/// let mut small = Image::<u8, 1>::from_size_val([320, 240].into(), 0).unwrap();
/// resize_native(&gray, &mut small, InterpolationMode::Bilinear).unwrap();
/// assert!(small.as_slice().iter().all(|&v| v == 90));
/// ```
pub fn resize_native<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError>
where
    T: ImageDtype,
{
    if src.size().is_empty() || dst.size().is_empty() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    let src_f32 = Image::<f32, C>::new(
        src.size(),
        src.as_slice().iter().map(|&v| v.into()).collect(),
    )?;

    let sx = src.width() as f32 / dst.width() as f32;
    let sy = src.height() as f32 / dst.height() as f32;

    parallel::par_iter_rows_indexed(dst, |x, y, dst_pixel| {
        let u = (x as f32 + 0.5) * sx - 0.5;
        let v = (y as f32 + 0.5) * sy - 0.5;
        let px = interpolate_pixel(&src_f32, u, v, interpolation);
        for (d, p) in dst_pixel.iter_mut().zip(px.iter()) {
            *d = T::from_f32(*p);
        }
    });

    Ok(())
}

/// Size obtained by scaling `size` so its area is at most `max_pixels`.
///
/// Returns the new size and the applied scale, which is `1.0` when no downscale is needed.
pub fn size_for_max_area(size: ImageSize, max_pixels: usize) -> (ImageSize, f64) {
    let area = size.area();
    if max_pixels == 0 || area <= max_pixels {
        return (size, 1.0);
    }
    let scale = (max_pixels as f64 / area as f64).sqrt();
    let new_size = ImageSize {
        width: ((size.width as f64 * scale).round() as usize).max(1),
        height: ((size.height as f64 * scale).round() as usize).max(1),
    };
    (new_size, scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_color_survives() -> Result<(), ImageError> {
        let image = Image::<f32, 3>::from_size_val([4, 5].into(), 1.0)?;
        let mut resized = Image::<f32, 3>::from_size_val([2, 3].into(), 0.0)?;
        resize_native(&image, &mut resized, InterpolationMode::Bilinear)?;
        assert!(resized.as_slice().iter().all(|&v| (v - 1.0).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn empty_is_rejected() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_size_val([4, 4].into(), 0)?;
        let mut empty = Image::<u8, 1>::from_size_val([0, 4].into(), 0)?;
        assert!(resize_native(&image, &mut empty, InterpolationMode::Nearest).is_err());
        Ok(())
    }

    #[test]
    fn resize_downscale_u8() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_fn([4, 2].into(), |x, _| [if x < 2 { 0 } else { 200 }])?;
        let mut small = Image::<u8, 1>::from_size_val([2, 1].into(), 0)?;
        resize_native(&image, &mut small, InterpolationMode::Bilinear)?;
        assert_eq!(small.as_slice(), &[0, 200]);
        Ok(())
    }

    #[test]
    fn max_area_scale() {
        let (size, scale) = size_for_max_area([400, 300].into(), 30_000);
        assert_eq!(size, ImageSize::from([200, 150]));
        approx::assert_relative_eq!(scale, 0.5);

        let (size, scale) = size_for_max_area([40, 30].into(), 30_000);
        assert_eq!(size, ImageSize::from([40, 30]));
        assert_eq!(scale, 1.0);
    }
}
