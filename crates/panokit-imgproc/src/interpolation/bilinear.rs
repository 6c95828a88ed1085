use panokit_image::Image;

/// Weighted mean of the four pixels around `(u, v)`.
///
/// Coordinates are clamped to the image, so samples on the last row or column reuse it.
pub(crate) fn bilinear_interpolation<const C: usize>(
    image: &Image<f32, C>,
    u: f32,
    v: f32,
) -> [f32; C] {
    let (u, v) = (u.max(0.0), v.max(0.0));
    let x0 = (u as usize).min(image.cols() - 1);
    let y0 = (v as usize).min(image.rows() - 1);
    let x1 = (x0 + 1).min(image.cols() - 1);
    let y1 = (y0 + 1).min(image.rows() - 1);
    let (fx, fy) = (u.fract(), v.fract());

    let taps = [
        (image.pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (image.pixel(x1, y0), fx * (1.0 - fy)),
        (image.pixel(x0, y1), (1.0 - fx) * fy),
        (image.pixel(x1, y1), fx * fy),
    ];

    let mut out = [0.0; C];
    for (px, w) in taps {
        for (o, &p) in out.iter_mut().zip(px) {
            *o += p * w;
        }
    }
    out
}
