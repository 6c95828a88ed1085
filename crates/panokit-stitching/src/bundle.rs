//! Levenberg-Marquardt refinement of focal lengths and rotations on matched rays.

use glam::{DMat3, DQuat, DVec2, DVec3};
use nalgebra::{DMatrix, DVector};

use crate::camera::CameraParams;
use crate::config::BundleAdjustConfig;
use crate::error::StitchError;
use crate::matcher::{FrameFeatures, MatchGraph};

const PARAMS_PER_CAMERA: usize = 4;
const LAMBDA_MUL: f64 = 10.0;

/// One matched keypoint pair between two cameras of the component.
#[derive(Debug, Clone, Copy)]
struct Observation {
    cam_i: usize,
    cam_j: usize,
    p_i: DVec2,
    p_j: DVec2,
}

fn camera_from_params(base: &CameraParams, x: &[f64]) -> CameraParams {
    CameraParams {
        focal: x[0],
        rotation: DMat3::from_quat(DQuat::from_scaled_axis(DVec3::new(x[1], x[2], x[3]))),
        ..*base
    }
}

fn residual(cam_i: &CameraParams, cam_j: &CameraParams, obs: &Observation) -> DVec3 {
    let ray_i = cam_i.pixel_to_ray(obs.p_i);
    let ray_j = cam_j.pixel_to_ray(obs.p_j);
    (ray_i - ray_j) * (cam_i.focal * cam_j.focal).abs().sqrt()
}

fn total_cost(base: &[CameraParams], x: &[f64], observations: &[Observation]) -> f64 {
    let cameras: Vec<CameraParams> = base
        .iter()
        .zip(x.chunks_exact(PARAMS_PER_CAMERA))
        .map(|(b, p)| camera_from_params(b, p))
        .collect();
    observations
        .iter()
        .map(|o| residual(&cameras[o.cam_i], &cameras[o.cam_j], o).length_squared())
        .sum()
}

fn collect_observations(
    frame_indices: &[usize],
    graph: &MatchGraph,
    features: &[FrameFeatures],
    min_confidence: f64,
    max_matches_per_edge: usize,
) -> Vec<Observation> {
    let mut observations = Vec::new();
    for edge in graph.edges.iter().filter(|e| e.confidence >= min_confidence) {
        let (Some(cam_i), Some(cam_j)) = (
            frame_indices.iter().position(|&f| f == edge.src),
            frame_indices.iter().position(|&f| f == edge.dst),
        ) else {
            continue;
        };

        let pairs: Vec<(usize, usize)> = edge.inlier_pairs().collect();
        let step = pairs.len().div_ceil(max_matches_per_edge.max(1)).max(1);
        observations.extend(pairs.iter().step_by(step).map(|&(a, b)| Observation {
            cam_i,
            cam_j,
            p_i: features[edge.src].point(a),
            p_j: features[edge.dst].point(b),
        }));
    }
    observations
}

/// Refine focal length and rotation of every camera by minimizing the distance between the
/// world rays of matched keypoints.
///
/// `cameras[k]` belongs to frame `frame_indices[k]`. Only edges with
/// `confidence >= min_confidence` contribute.
///
/// # Returns
///
/// The final RMS residual in pixels.
///
/// # Errors
///
/// [`StitchError::Estimation`] when a refined focal length is not finite and positive.
pub fn bundle_adjust(
    cameras: &mut [CameraParams],
    frame_indices: &[usize],
    graph: &MatchGraph,
    features: &[FrameFeatures],
    min_confidence: f64,
    config: &BundleAdjustConfig,
) -> Result<f64, StitchError> {
    let observations = collect_observations(
        frame_indices,
        graph,
        features,
        min_confidence,
        config.max_matches_per_edge,
    );
    if observations.is_empty() {
        log::warn!("bundle adjustment skipped, no observations");
        return Ok(0.0);
    }

    let base: Vec<CameraParams> = cameras.to_vec();
    let num_params = PARAMS_PER_CAMERA * cameras.len();
    let mut x: Vec<f64> = cameras
        .iter()
        .flat_map(|c| {
            let r = DQuat::from_mat3(&c.rotation).to_scaled_axis();
            [c.focal, r.x, r.y, r.z]
        })
        .collect();

    let mut cost = total_cost(&base, &x, &observations);
    let initial_cost = cost;
    let mut lambda = config.lambda_init;
    let mut iters = 0usize;

    while iters < config.max_iterations && cost > 1e-18 {
        iters += 1;

        let mut a = DMatrix::<f64>::zeros(num_params, num_params);
        let mut b = DVector::<f64>::zeros(num_params);

        let cams: Vec<CameraParams> = base
            .iter()
            .zip(x.chunks_exact(PARAMS_PER_CAMERA))
            .map(|(c, p)| camera_from_params(c, p))
            .collect();

        for obs in &observations {
            let r0 = residual(&cams[obs.cam_i], &cams[obs.cam_j], obs);

            // central differences over the 8 parameters touching this residual
            let mut jac = [DVec3::ZERO; 2 * PARAMS_PER_CAMERA];
            let mut cols = [0usize; 2 * PARAMS_PER_CAMERA];
            for (slot, (cam, k)) in [obs.cam_i, obs.cam_j]
                .into_iter()
                .flat_map(|c| (0..PARAMS_PER_CAMERA).map(move |k| (c, k)))
                .enumerate()
            {
                let col = cam * PARAMS_PER_CAMERA + k;
                let h = if k == 0 { 1e-6 * x[col].abs().max(1.0) } else { 1e-6 };
                let params = &x[cam * PARAMS_PER_CAMERA..(cam + 1) * PARAMS_PER_CAMERA];

                let mut plus = [0.0; PARAMS_PER_CAMERA];
                let mut minus = [0.0; PARAMS_PER_CAMERA];
                plus.copy_from_slice(params);
                minus.copy_from_slice(params);
                plus[k] += h;
                minus[k] -= h;

                let eval = |p: &[f64]| {
                    let perturbed = camera_from_params(&base[cam], p);
                    if cam == obs.cam_i {
                        residual(&perturbed, &cams[obs.cam_j], obs)
                    } else {
                        residual(&cams[obs.cam_i], &perturbed, obs)
                    }
                };
                jac[slot] = (eval(&plus[..]) - eval(&minus[..])) / (2.0 * h);
                cols[slot] = col;
            }

            for (s, &cs) in cols.iter().enumerate() {
                b[cs] += jac[s].dot(r0);
                for (t, &ct) in cols.iter().enumerate() {
                    a[(cs, ct)] += jac[s].dot(jac[t]);
                }
            }
        }

        // Marquardt damping on the diagonal
        for d in 0..num_params {
            a[(d, d)] += lambda * a[(d, d)].max(1e-12);
        }

        let step = nalgebra::linalg::Cholesky::new(a).map(|chol| chol.solve(&(-&b)));
        let Some(delta) = step else {
            lambda *= LAMBDA_MUL;
            continue;
        };

        let x_new: Vec<f64> = x.iter().zip(delta.iter()).map(|(v, d)| v + d).collect();
        let focal_ok = x_new
            .chunks_exact(PARAMS_PER_CAMERA)
            .all(|p| p[0].is_finite() && p[0] > 0.0);
        let cost_new = if focal_ok {
            total_cost(&base, &x_new, &observations)
        } else {
            f64::INFINITY
        };

        if cost_new < cost {
            let decrease = (cost - cost_new) / cost;
            x = x_new;
            cost = cost_new;
            lambda = (lambda / LAMBDA_MUL).max(1e-12);
            if decrease < config.eps {
                break;
            }
        } else {
            lambda *= LAMBDA_MUL;
            if lambda > 1e12 {
                break;
            }
        }
    }

    for (cam, p) in cameras.iter_mut().zip(x.chunks_exact(PARAMS_PER_CAMERA)) {
        *cam = camera_from_params(cam, p);
        if !(cam.focal.is_finite() && cam.focal > 0.0) || !cam.rotation.is_finite() {
            return Err(StitchError::Estimation(format!(
                "refined focal length {} is not usable",
                cam.focal
            )));
        }
    }

    let rms = (cost / (3 * observations.len()) as f64).sqrt();
    log::debug!(
        "bundle adjustment: {} observations, {iters} iterations, rms {:.4} -> {rms:.4} px",
        observations.len(),
        (initial_cost / (3 * observations.len()) as f64).sqrt(),
    );
    Ok(rms)
}
