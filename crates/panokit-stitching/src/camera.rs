use glam::{DMat3, DVec2, DVec3};

/// Intrinsics and orientation of one view.
///
/// `rotation` maps camera rays into the panorama frame, so a pixel `p` of the view looks along
/// the world direction `rotation * K^-1 * [p, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraParams {
    /// Focal length in pixels.
    pub focal: f64,
    /// Ratio between the vertical and the horizontal focal length.
    pub aspect: f64,
    /// Principal point column.
    pub ppx: f64,
    /// Principal point row.
    pub ppy: f64,
    /// Camera to panorama rotation.
    pub rotation: DMat3,
}

impl CameraParams {
    /// Camera with the principal point at the image center and identity rotation.
    pub fn new(focal: f64, width: usize, height: usize) -> Self {
        Self {
            focal,
            aspect: 1.0,
            ppx: width as f64 * 0.5,
            ppy: height as f64 * 0.5,
            rotation: DMat3::IDENTITY,
        }
    }

    /// Intrinsic matrix.
    pub fn k(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.focal, 0.0, 0.0),
            DVec3::new(0.0, self.focal * self.aspect, 0.0),
            DVec3::new(self.ppx, self.ppy, 1.0),
        )
    }

    /// Inverse of the intrinsic matrix.
    pub fn k_inv(&self) -> DMat3 {
        let fy = self.focal * self.aspect;
        DMat3::from_cols(
            DVec3::new(1.0 / self.focal, 0.0, 0.0),
            DVec3::new(0.0, 1.0 / fy, 0.0),
            DVec3::new(-self.ppx / self.focal, -self.ppy / fy, 1.0),
        )
    }

    /// Unit world ray through pixel `p`.
    pub fn pixel_to_ray(&self, p: DVec2) -> DVec3 {
        (self.rotation * self.k_inv() * p.extend(1.0)).normalize()
    }

    /// Pixel seeing the world direction `ray`, `None` behind the camera.
    pub fn ray_to_pixel(&self, ray: DVec3) -> Option<DVec2> {
        let cam = self.k() * (self.rotation.transpose() * ray);
        if cam.z <= 1e-9 {
            return None;
        }
        Some(DVec2::new(cam.x / cam.z, cam.y / cam.z))
    }
}

/// Closest rotation to `m` in the Frobenius sense.
pub(crate) fn orthonormalize(m: DMat3) -> DMat3 {
    let na = nalgebra::Matrix3::from_column_slice(&m.to_cols_array());
    let svd = na.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => {
            let mut r = u * v_t;
            if r.determinant() < 0.0 {
                let mut u = u;
                u.column_mut(2).neg_mut();
                r = u * v_t;
            }
            DMat3::from_cols_slice(r.as_slice())
        }
        _ => m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn k_and_inverse() {
        let cam = CameraParams {
            aspect: 1.1,
            ..CameraParams::new(300.0, 640, 480)
        };
        let id = cam.k() * cam.k_inv();
        assert!(id.abs_diff_eq(DMat3::IDENTITY, 1e-12));
    }

    #[test]
    fn ray_round_trip() {
        let cam = CameraParams {
            rotation: DMat3::from_rotation_y(0.3) * DMat3::from_rotation_x(-0.1),
            ..CameraParams::new(500.0, 640, 480)
        };
        let p = DVec2::new(100.0, 400.0);
        let ray = cam.pixel_to_ray(p);
        assert_relative_eq!(ray.length(), 1.0, epsilon = 1e-12);
        let q = cam.ray_to_pixel(ray).unwrap();
        assert_relative_eq!(q.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(q.y, p.y, epsilon = 1e-9);
        assert!(cam.ray_to_pixel(-ray).is_none());
    }

    #[test]
    fn orthonormalize_fixes_drift() {
        let r = DMat3::from_rotation_z(0.4);
        let noisy = r + DMat3::from_cols_array(&[1e-3, 0.0, 2e-3, 0.0, -1e-3, 0.0, 0.0, 0.0, 1e-3]);
        let fixed = orthonormalize(noisy);
        assert!((fixed * fixed.transpose()).abs_diff_eq(DMat3::IDENTITY, 1e-12));
        assert_relative_eq!(fixed.determinant(), 1.0, epsilon = 1e-12);
        assert!(fixed.abs_diff_eq(r, 1e-2));
    }
}
