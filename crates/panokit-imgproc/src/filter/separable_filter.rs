use panokit_image::{Image, ImageDtype, ImageError};
use rayon::prelude::*;

/// Correlate every row of an interleaved buffer with `kernel`, replicating the border.
fn filter_rows<const C: usize>(
    src: impl Fn(usize) -> f32 + Sync,
    dst: &mut [f32],
    cols: usize,
    kernel: &[f32],
) {
    let half = kernel.len() / 2;
    dst.par_chunks_exact_mut(cols * C)
        .enumerate()
        .for_each(|(r, row)| {
            let base = r * cols * C;
            for c in 0..cols {
                for ch in 0..C {
                    row[c * C + ch] = kernel
                        .iter()
                        .enumerate()
                        .map(|(i, &k)| {
                            let x = (c + i).saturating_sub(half).min(cols - 1);
                            k * src(base + x * C + ch)
                        })
                        .sum();
                }
            }
        });
}

/// Filter with `kernel_x` along rows, then `kernel_y` along columns.
///
/// Accumulation happens in `f32`; samples past the border repeat the edge pixel.
///
/// # Errors
///
/// Fails when a kernel is empty or the image sizes differ.
pub fn separable_filter<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError>
where
    T: ImageDtype,
{
    if kernel_x.is_empty() || kernel_y.is_empty() {
        return Err(ImageError::InvalidChannelShape(
            kernel_x.len(),
            kernel_y.len(),
        ));
    }
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

    let mut horizontal = vec![0.0f32; data.len()];
    filter_rows::<C>(|i| data[i].into(), &mut horizontal, cols, kernel_x);

    // vertical pass as a row pass over the transposed buffer
    let mut transposed = vec![0.0f32; data.len()];
    transpose::<C>(&horizontal, &mut transposed, rows, cols);
    let mut vertical = vec![0.0f32; data.len()];
    filter_rows::<C>(|i| transposed[i], &mut vertical, rows, kernel_y);
    transpose::<C>(&vertical, &mut horizontal, cols, rows);

    for (d, &v) in dst.as_slice_mut().iter_mut().zip(horizontal.iter()) {
        *d = T::from_f32(v);
    }
    Ok(())
}

/// Transpose a `rows x cols` interleaved buffer into `cols x rows`.
fn transpose<const C: usize>(src: &[f32], dst: &mut [f32], rows: usize, cols: usize) {
    for r in 0..rows {
        for c in 0..cols {
            let from = (r * cols + c) * C;
            let to = (c * rows + r) * C;
            dst[to..to + C].copy_from_slice(&src[from..from + C]);
        }
    }
}
