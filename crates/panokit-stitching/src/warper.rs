//! Projection of camera views onto the panorama surface.

use glam::{DVec2, DVec3};
use panokit_image::{Image, ImageSize};
use panokit_imgproc::{
    interpolation::{remap, InterpolationMode},
    parallel,
};

use crate::camera::CameraParams;
use crate::config::Projection;
use crate::error::StitchError;

/// Largest absolute surface coordinate a footprint is allowed to reach.
pub const MAX_SURFACE_EXTENT: f64 = (1u64 << 32) as f64;

/// Axis aligned rectangle in integer canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    /// Left column.
    pub x: i64,
    /// Top row.
    pub y: i64,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

impl Roi {
    /// Number of pixels covered, saturating at `usize::MAX`.
    pub fn area(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Exclusive right column.
    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    /// Exclusive bottom row.
    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Roi) -> Roi {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Roi {
            x,
            y,
            width: (self.right().max(other.right()) - x) as usize,
            height: (self.bottom().max(other.bottom()) - y) as usize,
        }
    }
}

/// A view resampled onto the panorama surface.
#[derive(Debug, Clone)]
pub struct WarpedView {
    /// Placement on the canvas.
    pub roi: Roi,
    /// Resampled color, zero outside the mask.
    pub image: Image<f32, 3>,
    /// 255 where the view contributes.
    pub mask: Image<u8, 1>,
}

/// Maps world rays to panorama surface coordinates scaled by `scale` pixels per radian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Warper {
    /// Surface type.
    pub projection: Projection,
    /// Pixels per unit on the surface, usually the median focal length.
    pub scale: f64,
}

impl Warper {
    /// Create a new warper.
    pub fn new(projection: Projection, scale: f64) -> Self {
        Self { projection, scale }
    }

    /// Surface coordinates of a world direction, `None` where the projection is undefined.
    pub fn forward(&self, ray: DVec3) -> Option<DVec2> {
        let s = self.scale;
        let uv = match self.projection {
            Projection::Plane => {
                if ray.z <= 1e-9 {
                    return None;
                }
                DVec2::new(s * ray.x / ray.z, s * ray.y / ray.z)
            }
            Projection::Cylindrical => {
                let r = ray.x.hypot(ray.z);
                if r <= 1e-12 {
                    return None;
                }
                DVec2::new(s * ray.x.atan2(ray.z), s * ray.y / r)
            }
            Projection::Spherical => {
                let len = ray.length();
                if len <= 1e-12 {
                    return None;
                }
                DVec2::new(s * ray.x.atan2(ray.z), s * (ray.y / len).clamp(-1.0, 1.0).asin())
            }
        };
        uv.is_finite().then_some(uv)
    }

    /// World direction seen at surface coordinates `uv`.
    pub fn inverse(&self, uv: DVec2) -> DVec3 {
        let (u, v) = (uv.x / self.scale, uv.y / self.scale);
        match self.projection {
            Projection::Plane => DVec3::new(u, v, 1.0),
            Projection::Cylindrical => DVec3::new(u.sin(), v, u.cos()),
            Projection::Spherical => DVec3::new(u.sin() * v.cos(), v.sin(), u.cos() * v.cos()),
        }
    }

    /// Bounding box of the view on the surface, from its border pixels.
    pub fn warp_roi(&self, camera: &CameraParams, size: ImageSize) -> Option<Roi> {
        if size.is_empty() {
            return None;
        }
        let (w, h) = (size.width - 1, size.height - 1);
        let border = (0..=w)
            .flat_map(|x| [(x, 0), (x, h)])
            .chain((0..=h).flat_map(|y| [(0, y), (w, y)]));

        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        for (x, y) in border {
            let ray = camera.pixel_to_ray(DVec2::new(x as f64, y as f64));
            if let Some(uv) = self.forward(ray) {
                min = min.min(uv);
                max = max.max(uv);
            }
        }
        if !(min.is_finite() && max.is_finite()) {
            return None;
        }

        // rays grazing the image plane land arbitrarily far away
        let bound = DVec2::splat(MAX_SURFACE_EXTENT);
        let (min, max) = (min.clamp(-bound, bound), max.clamp(-bound, bound));

        // canvas pixel x samples surface coordinate x
        let (x0, y0) = (min.x.floor(), min.y.floor());
        let (x1, y1) = (max.x.floor(), max.y.floor());
        Some(Roi {
            x: x0 as i64,
            y: y0 as i64,
            width: (x1 - x0) as usize + 1,
            height: (y1 - y0) as usize + 1,
        })
    }

    /// Resample a view onto its surface rectangle.
    ///
    /// Canvas pixels whose source falls outside the view, or outside `src_mask`, are masked out.
    ///
    /// # Returns
    ///
    /// `None` when the view has no footprint on the surface.
    pub fn warp(
        &self,
        src: &Image<f32, 3>,
        src_mask: &Image<u8, 1>,
        camera: &CameraParams,
    ) -> Result<Option<WarpedView>, StitchError> {
        let Some(roi) = self.warp_roi(camera, src.size()) else {
            return Ok(None);
        };
        let size = ImageSize {
            width: roi.width,
            height: roi.height,
        };

        let mut maps = Image::<f32, 2>::from_size_val(size, f32::NAN)?;
        parallel::par_iter_rows_indexed(&mut maps, |x, y, px| {
            let uv = DVec2::new((roi.x + x as i64) as f64, (roi.y + y as i64) as f64);
            if let Some(p) = camera.ray_to_pixel(self.inverse(uv)) {
                px[0] = p.x as f32;
                px[1] = p.y as f32;
            }
        });
        let maps = maps.split_channels()?;
        let (map_x, map_y) = (&maps[0], &maps[1]);

        let mut image = Image::<f32, 3>::from_size_val(size, 0.0)?;
        remap(src, &mut image, map_x, map_y, InterpolationMode::Bilinear)?;

        let src_mask = src_mask.cast::<f32>()?;
        let mut coverage = Image::<f32, 1>::from_size_val(size, 0.0)?;
        remap(&src_mask, &mut coverage, map_x, map_y, InterpolationMode::Nearest)?;

        let mask = Image::<u8, 1>::new(
            size,
            coverage
                .as_slice()
                .iter()
                .map(|&c| if c > 127.0 { 255 } else { 0 })
                .collect(),
        )?;

        // keep the color clean outside the footprint
        for (px, &m) in image.as_slice_mut().chunks_exact_mut(3).zip(mask.as_slice()) {
            if m == 0 {
                px.fill(0.0);
            }
        }

        Ok(Some(WarpedView { roi, image, mask }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DMat3;
    use panokit_image::ImageError;

    #[test]
    fn forward_inverse_consistent() {
        for projection in [
            Projection::Plane,
            Projection::Cylindrical,
            Projection::Spherical,
        ] {
            let warper = Warper::new(projection, 300.0);
            for ray in [
                DVec3::new(0.0, 0.0, 1.0),
                DVec3::new(0.3, -0.2, 1.0),
                DVec3::new(-0.5, 0.4, 0.8),
            ] {
                let uv = warper.forward(ray).unwrap();
                let back = warper.inverse(uv);
                let angle = back.normalize().angle_between(ray.normalize());
                assert_relative_eq!(angle, 0.0, epsilon = 1e-9);
            }
        }
        assert!(Warper::new(Projection::Plane, 1.0)
            .forward(DVec3::new(0.0, 0.0, -1.0))
            .is_none());
    }

    #[test]
    fn roi_of_centered_plane_view() {
        let camera = CameraParams::new(100.0, 101, 51);
        let roi = Warper::new(Projection::Plane, 100.0)
            .warp_roi(&camera, [101, 51].into())
            .unwrap();
        // pixel centers map to [-50.5, 49.5] x [-25.5, 24.5]
        assert_eq!((roi.x, roi.y), (-51, -26));
        assert_eq!((roi.width, roi.height), (101, 51));
    }

    #[test]
    fn grazing_rays_are_clamped() {
        // a tiny focal length sends the border rays almost parallel to the image plane
        let camera = CameraParams::new(1e-5, 200, 100);
        let roi = Warper::new(Projection::Plane, 1000.0)
            .warp_roi(&camera, [200, 100].into())
            .unwrap();
        let extent = MAX_SURFACE_EXTENT as i64;
        assert_eq!((roi.x, roi.y), (-extent, -extent));
        assert_eq!(roi.right(), extent + 1);
        assert_eq!(roi.area(), usize::MAX);
    }

    #[test]
    fn roi_union() {
        let a = Roi {
            x: -5,
            y: 0,
            width: 10,
            height: 4,
        };
        let b = Roi {
            x: 2,
            y: -3,
            width: 10,
            height: 4,
        };
        assert_eq!(
            a.union(&b),
            Roi {
                x: -5,
                y: -3,
                width: 17,
                height: 7
            }
        );
    }

    #[test]
    fn plane_warp_is_a_shift() -> Result<(), StitchError> {
        let size: ImageSize = [40, 30].into();
        let src = Image::<f32, 3>::from_fn(size, |x, y| {
            let v = (x * 3 + y * 7) as f32;
            [v, v + 1.0, v + 2.0]
        })?;
        let mask = Image::<u8, 1>::from_size_val(size, 255)?;
        let camera = CameraParams::new(50.0, 40, 30);
        let warped = Warper::new(Projection::Plane, 50.0)
            .warp(&src, &mask, &camera)?
            .ok_or(ImageError::CastError)?;

        // canvas (u, v) sees pixel (u + 20, v + 15)
        let (ox, oy) = ((-warped.roi.x) as usize, (-warped.roi.y) as usize);
        for (x, y) in [(0usize, 0usize), (10, 5), (39, 29)] {
            let cx = x + ox - 20;
            let cy = y + oy - 15;
            let got = warped.image.pixel(cx, cy);
            assert_relative_eq!(got[0], src.pixel(x, y)[0], epsilon = 1e-3);
            assert_eq!(warped.mask.pixel(cx, cy)[0], 255);
        }
        Ok(())
    }

    #[test]
    fn rotated_view_and_alpha_mask() -> Result<(), StitchError> {
        let size: ImageSize = [32, 24].into();
        let src = Image::<f32, 3>::from_size_val(size, 100.0)?;
        // left half transparent
        let mask = Image::<u8, 1>::from_fn(size, |x, _| [if x < 16 { 0 } else { 255 }])?;
        let camera = CameraParams {
            rotation: DMat3::from_rotation_y(0.2),
            ..CameraParams::new(40.0, 32, 24)
        };
        let warped = Warper::new(Projection::Spherical, 40.0)
            .warp(&src, &mask, &camera)?
            .ok_or(ImageError::CastError)?;

        let covered = warped.mask.as_slice().iter().filter(|&&m| m == 255).count();
        assert!(covered > 0 && covered < warped.roi.area());
        for (px, &m) in warped.image.as_slice().chunks_exact(3).zip(warped.mask.as_slice()) {
            if m == 255 {
                assert_relative_eq!(px[0], 100.0, epsilon = 1e-3);
            } else {
                assert_eq!(px[0], 0.0);
            }
        }
        Ok(())
    }
}
