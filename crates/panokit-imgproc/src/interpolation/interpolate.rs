use super::bilinear::bilinear_interpolation;
use super::nearest::nearest_neighbor_interpolation;
use panokit_image::Image;

/// How a pixel value is reconstructed at a fractional coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// Weighted mean of the four surrounding pixels.
    #[default]
    Bilinear,
    /// Closest pixel, keeps masks binary.
    Nearest,
}

/// Sample `image` at column `u`, row `v`.
///
/// PRECONDITION: the image is not empty.
pub fn interpolate_pixel<const C: usize>(
    image: &Image<f32, C>,
    u: f32,
    v: f32,
    interpolation: InterpolationMode,
) -> [f32; C] {
    match interpolation {
        InterpolationMode::Bilinear => bilinear_interpolation(image, u, v),
        InterpolationMode::Nearest => nearest_neighbor_interpolation(image, u, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panokit_image::ImageError;

    #[test]
    fn interpolate_bilinear_center() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new([2, 2].into(), vec![0.0, 1.0, 2.0, 3.0])?;
        let px = interpolate_pixel(&image, 0.5, 0.5, InterpolationMode::Bilinear);
        approx::assert_relative_eq!(px[0], 1.5);
        let px = interpolate_pixel(&image, 1.0, 1.0, InterpolationMode::Bilinear);
        approx::assert_relative_eq!(px[0], 3.0);
        Ok(())
    }

    #[test]
    fn interpolate_nearest() -> Result<(), ImageError> {
        let image = Image::<f32, 2>::new([2, 1].into(), vec![0.0, 1.0, 2.0, 3.0])?;
        let px = interpolate_pixel(&image, 0.7, 0.0, InterpolationMode::Nearest);
        assert_eq!(px, [2.0, 3.0]);
        Ok(())
    }
}
