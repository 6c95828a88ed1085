//! Horizontal wave correction: a global rotation that levels the panorama horizon.

use glam::{DMat3, DVec3};
use nalgebra::Matrix3;

use crate::camera::CameraParams;

/// Rotate all cameras so their common "up" direction is the panorama vertical axis.
///
/// The vertical axis is the direction most orthogonal to every camera's horizontal axis.
/// Fewer than two cameras, or a configuration where that direction is ambiguous, leaves the
/// cameras untouched.
pub fn wave_correct(cameras: &mut [CameraParams]) {
    if cameras.len() < 2 {
        log::warn!("wave correction skipped, need at least 2 cameras");
        return;
    }

    let mut moment = Matrix3::<f64>::zeros();
    for cam in cameras.iter() {
        let x = cam.rotation.x_axis;
        let col = nalgebra::Vector3::new(x.x, x.y, x.z);
        moment += col * col.transpose();
    }

    let eigen = moment.symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let (l_min, l_mid, l_max) = (
        eigen.eigenvalues[order[0]],
        eigen.eigenvalues[order[1]],
        eigen.eigenvalues[order[2]],
    );

    // all horizontal axes parallel: any orthogonal direction would do
    if l_mid < 1e-3 * l_max || (l_mid - l_min) < 1e-9 * l_max {
        log::warn!("wave correction skipped, camera axes are degenerate");
        return;
    }

    let v = eigen.eigenvectors.column(order[0]);
    let rg1 = DVec3::new(v[0], v[1], v[2]);

    let img_k = cameras
        .iter()
        .fold(DVec3::ZERO, |acc, cam| acc + cam.rotation.z_axis);
    let rg0 = rg1.cross(img_k);
    let rg0_norm = rg0.length();
    if rg0_norm < 1e-9 {
        log::warn!("wave correction skipped, viewing directions are aligned with the vertical");
        return;
    }
    let mut rg0 = rg0 / rg0_norm;
    let mut rg1 = rg1;

    let conf: f64 = cameras.iter().map(|c| rg0.dot(c.rotation.x_axis)).sum();
    if conf < 0.0 {
        rg0 = -rg0;
        rg1 = -rg1;
    }
    let rg2 = rg0.cross(rg1);

    // rows rg0, rg1, rg2
    let correction = DMat3::from_cols(rg0, rg1, rg2).transpose();
    for cam in cameras.iter_mut() {
        cam.rotation = correction * cam.rotation;
    }

    log::debug!("wave correction applied to {} cameras", cameras.len());
}
