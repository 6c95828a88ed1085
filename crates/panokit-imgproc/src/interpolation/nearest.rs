use panokit_image::Image;

/// Value of the pixel closest to `(u, v)`, clamped to the image.
pub(crate) fn nearest_neighbor_interpolation<const C: usize>(
    image: &Image<f32, C>,
    u: f32,
    v: f32,
) -> [f32; C] {
    let x = (u.max(0.0).round() as usize).min(image.cols() - 1);
    let y = (v.max(0.0).round() as usize).min(image.rows() - 1);

    let mut out = [0.0; C];
    out.copy_from_slice(image.pixel(x, y));
    out
}
