//! Robust planar homography estimation between two views.

use glam::{DMat3, DVec2, DVec3};
use nalgebra::{DMatrix, SMatrix, SVector};
use rand::{rngs::StdRng, SeedableRng};

/// Errors returned by homography estimation.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum HomographyError {
    /// Input correspondences are invalid or insufficient.
    #[error("need at least {required} correspondences and equal lengths")]
    InvalidInput {
        /// Minimum required correspondences.
        required: usize,
    },

    /// RANSAC failed to find a valid model.
    #[error("RANSAC failed to find a valid model")]
    RansacFailure,
}

/// Parameters for RANSAC model estimation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Inlier threshold in pixels.
    pub threshold: f64,
    /// Probability of having drawn at least one outlier-free sample when stopping early.
    pub confidence: f64,
    /// Base seed, combined with the pair indices for each frame pair.
    pub random_seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            threshold: 3.0,
            confidence: 0.995,
            random_seed: 0,
        }
    }
}

/// Result of a RANSAC model fit.
#[derive(Clone, Debug)]
pub struct RansacResult {
    /// Homography mapping source pixels to destination pixels.
    pub model: DMat3,
    /// Per-correspondence inlier mask.
    pub inliers: Vec<bool>,
    /// Total inlier count.
    pub inlier_count: usize,
}

/// Map `p` with the homography `h`.
pub fn project(h: &DMat3, p: DVec2) -> Option<DVec2> {
    let q = *h * p.extend(1.0);
    if q.z.abs() < 1e-12 {
        return None;
    }
    Some(DVec2::new(q.x / q.z, q.y / q.z))
}

fn reprojection_error_sq(h: &DMat3, src: DVec2, dst: DVec2) -> f64 {
    match project(h, src) {
        Some(q) => q.distance_squared(dst),
        None => f64::INFINITY,
    }
}

fn from_row_major(h: &[f64]) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(h[0], h[3], h[6]),
        DVec3::new(h[1], h[4], h[7]),
        DVec3::new(h[2], h[5], h[8]),
    )
}

/// Normalize a homography so that `h[2][2] == 1`, rejecting degenerate ones.
fn normalized(h: DMat3) -> Option<DMat3> {
    let h22 = h.z_axis.z;
    if h22.abs() < 1e-12 {
        return None;
    }
    let h = h * (1.0 / h22);
    if !h.is_finite() || h.determinant().abs() < 1e-8 {
        return None;
    }
    Some(h)
}

fn collinear(a: DVec2, b: DVec2, c: DVec2) -> bool {
    let area = (b - a).perp_dot(c - a).abs();
    let scale = (b - a).length_squared().max((c - a).length_squared()).max(1.0);
    area < 1e-3 * scale
}

fn degenerate_sample(p: &[DVec2; 4]) -> bool {
    collinear(p[0], p[1], p[2])
        || collinear(p[0], p[1], p[3])
        || collinear(p[0], p[2], p[3])
        || collinear(p[1], p[2], p[3])
}

/// Exact homography from four correspondences, with `h[2][2]` fixed to one.
pub fn homography_4pt(src: &[DVec2; 4], dst: &[DVec2; 4]) -> Option<DMat3> {
    if degenerate_sample(src) || degenerate_sample(dst) {
        return None;
    }

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (u, v) = (dst[i].x, dst[i].y);
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;

        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }

    let h = a.lu().solve(&b)?;
    let mut full = [1.0; 9];
    full[..8].copy_from_slice(h.as_slice());
    normalized(from_row_major(&full))
}

/// Similarity moving the centroid to the origin with mean distance `sqrt(2)`.
fn conditioning(points: &[DVec2]) -> DMat3 {
    let n = points.len() as f64;
    let centroid = points.iter().copied().sum::<DVec2>() / n;
    let mean_dist = points.iter().map(|p| p.distance(centroid)).sum::<f64>() / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    DMat3::from_cols(
        DVec3::new(s, 0.0, 0.0),
        DVec3::new(0.0, s, 0.0),
        DVec3::new(-s * centroid.x, -s * centroid.y, 1.0),
    )
}

/// Least squares homography from `n >= 4` correspondences (normalized DLT).
pub fn homography_dlt(src: &[DVec2], dst: &[DVec2]) -> Option<DMat3> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    let t_src = conditioning(src);
    let t_dst = conditioning(dst);

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let s = t_src.transform_point2(*s);
        let d = t_dst.transform_point2(*d);
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        a[(r, 8)] = -u;
        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        a[(r + 1, 8)] = -v;
    }

    // null vector of A is the eigenvector of A^T A with the smallest eigenvalue
    let eigen = a.tr_mul(&a).symmetric_eigen();
    let (idx, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = eigen.eigenvectors.column(idx);
    let h_norm = from_row_major(h.as_slice());

    normalized(t_dst.inverse() * h_norm * t_src)
}

fn count_inliers(h: &DMat3, src: &[DVec2], dst: &[DVec2], threshold_sq: f64) -> (Vec<bool>, usize) {
    let inliers: Vec<bool> = src
        .iter()
        .zip(dst.iter())
        .map(|(s, d)| reprojection_error_sq(h, *s, *d) <= threshold_sq)
        .collect();
    let count = inliers.iter().filter(|&&b| b).count();
    (inliers, count)
}

fn required_iterations(confidence: f64, inlier_ratio: f64, max_iterations: usize) -> usize {
    let w4 = inlier_ratio.powi(4);
    if w4 >= 1.0 - f64::EPSILON {
        return 1;
    }
    if w4 <= f64::EPSILON {
        return max_iterations;
    }
    let n = (1.0 - confidence).ln() / (1.0 - w4).ln();
    if n.is_finite() {
        (n.ceil() as usize).clamp(1, max_iterations)
    } else {
        max_iterations
    }
}

/// Estimate a homography with RANSAC using the 4-point solver.
///
/// The best model is refitted on its inliers with the normalized DLT.
///
/// # Arguments
///
/// * `src` - Points in the source view.
/// * `dst` - Corresponding points in the destination view.
/// * `params` - RANSAC settings.
/// * `seed` - Seed of the sampler, the same seed gives the same result.
pub fn ransac_homography(
    src: &[DVec2],
    dst: &[DVec2],
    params: &RansacParams,
    seed: u64,
) -> Result<RansacResult, HomographyError> {
    if src.len() != dst.len() || src.len() < 4 {
        return Err(HomographyError::InvalidInput { required: 4 });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let n = src.len();
    let threshold_sq = params.threshold * params.threshold;

    let mut best_model = None;
    let mut best_count = 0usize;
    let mut iterations = params.max_iterations;
    let mut iter = 0usize;

    while iter < iterations {
        iter += 1;
        let sample = rand::seq::index::sample(&mut rng, n, 4);
        let mut s = [DVec2::ZERO; 4];
        let mut d = [DVec2::ZERO; 4];
        for (i, idx) in sample.iter().enumerate() {
            s[i] = src[idx];
            d[i] = dst[idx];
        }
        let Some(h) = homography_4pt(&s, &d) else {
            continue;
        };

        let (_, count) = count_inliers(&h, src, dst, threshold_sq);
        if count > best_count {
            best_model = Some(h);
            best_count = count;
            iterations = required_iterations(
                params.confidence,
                count as f64 / n as f64,
                params.max_iterations,
            )
            .max(iter);
        }
    }

    let mut model = best_model.ok_or(HomographyError::RansacFailure)?;
    let (mut inliers, mut inlier_count) = count_inliers(&model, src, dst, threshold_sq);

    // refit on the consensus set, keep it only if it does not lose support
    let (s_in, d_in): (Vec<DVec2>, Vec<DVec2>) = src
        .iter()
        .zip(dst.iter())
        .zip(inliers.iter())
        .filter(|(_, &keep)| keep)
        .map(|((s, d), _)| (*s, *d))
        .unzip();
    if let Some(refined) = homography_dlt(&s_in, &d_in) {
        let (refined_inliers, refined_count) = count_inliers(&refined, src, dst, threshold_sq);
        if refined_count >= inlier_count {
            model = refined;
            inliers = refined_inliers;
            inlier_count = refined_count;
        }
    }

    log::trace!("ransac: {inlier_count}/{n} inliers after {iter} iterations");

    Ok(RansacResult {
        model,
        inliers,
        inlier_count,
    })
}
