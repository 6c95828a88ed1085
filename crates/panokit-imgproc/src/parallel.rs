use rayon::prelude::*;

use panokit_image::Image;

/// Run `f` on every `(src, dst)` pixel pair, one rayon task per row.
///
/// PRECONDITION: `src` and `dst` have the same size.
pub fn par_iter_rows<T1, const C1: usize, T2, const C2: usize>(
    src: &Image<T1, C1>,
    dst: &mut Image<T2, C2>,
    f: impl Fn(&[T1], &mut [T2]) + Send + Sync,
) where
    T1: Send + Sync,
    T2: Send + Sync,
{
    let cols = src.cols();
    let src_rows = src.as_slice().par_chunks_exact(C1 * cols);
    let dst_rows = dst.as_slice_mut().par_chunks_exact_mut(C2 * cols);

    src_rows.zip(dst_rows).for_each(|(src_row, dst_row)| {
        for (s, d) in src_row.chunks_exact(C1).zip(dst_row.chunks_exact_mut(C2)) {
            f(s, d);
        }
    });
}

/// Fill every pixel of `dst` from its `(x, y)` coordinates, one rayon task per row.
pub fn par_iter_rows_indexed<T, const C: usize>(
    dst: &mut Image<T, C>,
    f: impl Fn(usize, usize, &mut [T]) + Send + Sync,
) where
    T: Send + Sync,
{
    let cols = dst.cols();
    dst.as_slice_mut()
        .par_chunks_exact_mut(C * cols)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.chunks_exact_mut(C).enumerate() {
                f(x, y, pixel);
            }
        });
}
