use crate::parallel;

use super::interpolate::interpolate_pixel;
use super::InterpolationMode;
use panokit_image::{Image, ImageError};

/// Sample `src` at the coordinates stored in `map_x` / `map_y` for every pixel of `dst`.
///
/// Destination pixels whose source coordinate is not finite or lies outside
/// `[0, width - 1] x [0, height - 1]` keep their current value, so `dst` can be pre-filled with
/// a background.
///
/// # Errors
///
/// The maps must have the size of `dst`, and `src` must not be empty.
pub fn remap<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    map_x: &Image<f32, 1>,
    map_y: &Image<f32, 1>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    for map in [map_x, map_y] {
        if map.size() != dst.size() {
            return Err(ImageError::InvalidImageSize(
                map.cols(),
                map.rows(),
                dst.cols(),
                dst.rows(),
            ));
        }
    }
    if src.size().is_empty() {
        return Err(ImageError::EmptyImage(src.cols(), src.rows()));
    }

    let (max_x, max_y) = ((src.cols() - 1) as f32, (src.rows() - 1) as f32);
    let size = dst.size();
    let (xs, ys) = (map_x.as_slice(), map_y.as_slice());

    parallel::par_iter_rows_indexed(dst, |x, y, pixel| {
        let idx = size.index(y, x);
        let (u, v) = (xs[idx], ys[idx]);
        // NaN fails both comparisons
        if (0.0..=max_x).contains(&u) && (0.0..=max_y).contains(&v) {
            pixel.copy_from_slice(&interpolate_pixel(src, u, v, interpolation));
        }
    });

    Ok(())
}
