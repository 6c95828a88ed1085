//! Gain exposure compensation from the mean intensities of overlapping views.

use nalgebra::{DMatrix, DVector};

use crate::warper::WarpedView;

/// Standard deviation of the intensity error between overlapping views.
const SIGMA_N: f64 = 10.0;
/// Standard deviation of the gains around one.
const SIGMA_G: f64 = 0.1;

/// Overlap pixel count and mean intensities `(n, mean_a, mean_b)` of two warped views.
fn overlap_stats(a: &WarpedView, b: &WarpedView) -> (usize, f64, f64) {
    let x0 = a.roi.x.max(b.roi.x);
    let y0 = a.roi.y.max(b.roi.y);
    let x1 = a.roi.right().min(b.roi.right());
    let y1 = a.roi.bottom().min(b.roi.bottom());

    let intensity = |px: &[f32]| {
        let (r, g, b) = (px[0] as f64, px[1] as f64, px[2] as f64);
        (r * r + g * g + b * b).sqrt()
    };

    let (mut n, mut sum_a, mut sum_b) = (0usize, 0.0, 0.0);
    for y in y0..y1 {
        for x in x0..x1 {
            let (ax, ay) = ((x - a.roi.x) as usize, (y - a.roi.y) as usize);
            let (bx, by) = ((x - b.roi.x) as usize, (y - b.roi.y) as usize);
            if a.mask.pixel(ax, ay)[0] == 0 || b.mask.pixel(bx, by)[0] == 0 {
                continue;
            }
            n += 1;
            sum_a += intensity(a.image.pixel(ax, ay));
            sum_b += intensity(b.image.pixel(bx, by));
        }
    }

    if n == 0 {
        return (0, 0.0, 0.0);
    }
    (n, sum_a / n as f64, sum_b / n as f64)
}

/// Per-view gains equalizing the brightness of overlapping regions.
///
/// Solves the least squares problem on the overlap means, with a prior pulling every gain
/// towards one. Views without overlap keep a gain of one.
pub fn compensate_gains(views: &[WarpedView]) -> Vec<f64> {
    let n = views.len();
    let alpha = 1.0 / (SIGMA_N * SIGMA_N);
    let beta = 1.0 / (SIGMA_G * SIGMA_G);

    let mut counts = DMatrix::<f64>::zeros(n, n);
    let mut means = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        counts[(i, i)] = views[i].mask.as_slice().iter().filter(|&&m| m != 0).count() as f64;
        for j in i + 1..n {
            let (count, mean_i, mean_j) = overlap_stats(&views[i], &views[j]);
            counts[(i, j)] = count.max(1) as f64;
            counts[(j, i)] = count.max(1) as f64;
            means[(i, j)] = mean_i;
            means[(j, i)] = mean_j;
        }
    }

    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut b = DVector::<f64>::zeros(n);
    for i in 0..n {
        for j in 0..n {
            b[i] += beta * counts[(i, j)];
            a[(i, i)] += beta * counts[(i, j)];
            if i == j {
                continue;
            }
            a[(i, i)] += 2.0 * alpha * means[(i, j)] * means[(i, j)] * counts[(i, j)];
            a[(i, j)] -= 2.0 * alpha * means[(i, j)] * means[(j, i)] * counts[(i, j)];
        }
    }

    match a.lu().solve(&b) {
        Some(gains) if gains.iter().all(|g| g.is_finite() && *g > 0.0) => {
            log::debug!("exposure gains: {:?}", gains.as_slice());
            gains.iter().copied().collect()
        }
        _ => {
            log::warn!("gain compensation failed, keeping unit gains");
            vec![1.0; n]
        }
    }
}

/// Scale the color of every view by its gain.
pub fn apply_gains(views: &mut [WarpedView], gains: &[f64]) {
    for (view, &gain) in views.iter_mut().zip(gains) {
        let gain = gain as f32;
        view.image.as_slice_mut().iter_mut().for_each(|v| *v *= gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warper::Roi;
    use panokit_image::{Image, ImageError};

    fn view(x: i64, value: f32) -> Result<WarpedView, ImageError> {
        let size = [20, 10].into();
        Ok(WarpedView {
            roi: Roi {
                x,
                y: 0,
                width: 20,
                height: 10,
            },
            image: Image::from_size_val(size, value)?,
            mask: Image::from_size_val(size, 255)?,
        })
    }

    #[test]
    fn darker_view_gets_larger_gain() -> Result<(), ImageError> {
        let mut views = vec![view(0, 100.0)?, view(10, 50.0)?];
        let gains = compensate_gains(&views);
        assert!(gains[1] > gains[0], "{gains:?}");

        let before = 100.0 - 50.0;
        apply_gains(&mut views, &gains);
        let after = (views[0].image.as_slice()[0] - views[1].image.as_slice()[0]).abs();
        assert!(after < before);
        Ok(())
    }

    #[test]
    fn equal_views_keep_unit_gain() -> Result<(), ImageError> {
        let views = vec![view(0, 80.0)?, view(5, 80.0)?, view(40, 10.0)?];
        let gains = compensate_gains(&views);
        approx::assert_relative_eq!(gains[0], 1.0, epsilon = 1e-9);
        approx::assert_relative_eq!(gains[1], 1.0, epsilon = 1e-9);
        // no overlap with the others
        approx::assert_relative_eq!(gains[2], 1.0, epsilon = 1e-9);
        Ok(())
    }
}
