use panokit_image::{Image, ImageError};
use rayon::prelude::*;

use super::{kernels, separable_filter};

/// Gaussian blur with per-axis kernel sizes and sigmas.
///
/// # Example
///
/// ```
/// use panokit_image::Image;
/// use panokit_imgproc::filter::{gaussian_blur, kernels};
///
/// let src = Image::<f32, 1>::from_fn([9, 9].into(), |x, y| [(x == 4 && y == 4) as u8 as f32])
///     .unwrap();
/// let mut dst = Image::<f32, 1>::from_size_val(src.size(), 0.0).unwrap();
/// let k = kernels::gaussian_kernel_size(1.0);
/// gaussian_blur(&src, &mut dst, (k, k), (1.0, 1.0)).unwrap();
///
/// let total: f32 = dst.as_slice().iter().sum();
/// assert!((total - 1.0).abs() < 1e-4);
/// ```
pub fn gaussian_blur<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_size: (usize, usize),
    sigma: (f32, f32),
) -> Result<(), ImageError> {
    let kernel_x = kernels::gaussian_kernel_1d(kernel_size.0, sigma.0);
    let kernel_y = kernels::gaussian_kernel_1d(kernel_size.1, sigma.1);
    separable_filter(src, dst, &kernel_x, &kernel_y)
}

/// 4-neighbour Laplacian of a single channel image, borders replicated.
pub fn laplacian(src: &Image<f32, 1>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }
    if src.size().is_empty() {
        return Ok(());
    }

    let (rows, cols) = (src.rows(), src.cols());
    let data = src.as_slice();
    // stencil offsets with non-zero weight
    let taps: Vec<(usize, usize, f32)> = kernels::LAPLACIAN_3X3
        .iter()
        .enumerate()
        .flat_map(|(ky, row)| row.iter().enumerate().map(move |(kx, &w)| (ky, kx, w)))
        .filter(|&(_, _, w)| w != 0.0)
        .collect();

    dst.as_slice_mut()
        .par_chunks_exact_mut(cols)
        .enumerate()
        .for_each(|(r, out_row)| {
            for (c, out) in out_row.iter_mut().enumerate() {
                *out = taps
                    .iter()
                    .map(|&(ky, kx, w)| {
                        let y = (r + ky).saturating_sub(1).min(rows - 1);
                        let x = (c + kx).saturating_sub(1).min(cols - 1);
                        w * data[y * cols + x]
                    })
                    .sum();
            }
        });

    Ok(())
}
