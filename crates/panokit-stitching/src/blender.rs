//! Feather blending around the seams.

use panokit_image::{Image, ImageSize};
use panokit_imgproc::distance_transform::signed_distance_transform;

use crate::error::StitchError;
use crate::warper::{Roi, WarpedView};

/// Blended canvas.
#[derive(Debug, Clone)]
pub struct BlendResult {
    /// Blended color.
    pub image: Image<f32, 3>,
    /// 255 where at least one view contributes.
    pub coverage: Image<u8, 1>,
}

/// Width in pixels of the transition band for a blending strength in `[0, 100]`.
pub fn feather_width(strength: f64, canvas: &Roi) -> f64 {
    strength.clamp(0.0, 100.0) / 100.0 * (canvas.area() as f64).sqrt()
}

/// Blend weight of one view: one deep inside its seam region, fading to zero across the seam
/// over `width` pixels, always zero outside its footprint.
///
/// A `width` of zero gives the hard seam mask.
pub fn blend_weights(
    mask: &Image<u8, 1>,
    seam: &Image<u8, 1>,
    width: f64,
) -> Result<Image<f32, 1>, StitchError> {
    if width <= 0.0 {
        let weights = mask
            .as_slice()
            .iter()
            .zip(seam.as_slice())
            .map(|(&m, &s)| if m != 0 && s != 0 { 1.0 } else { 0.0 })
            .collect();
        return Ok(Image::new(mask.size(), weights)?);
    }

    let mut signed = Image::<f32, 1>::from_size_val(seam.size(), 0.0)?;
    signed_distance_transform(seam, &mut signed)?;

    let width = width as f32;
    let weights = mask
        .as_slice()
        .iter()
        .zip(signed.as_slice())
        .map(|(&m, &d)| {
            if m == 0 {
                0.0
            } else {
                (0.5 + d / width).clamp(0.0, 1.0)
            }
        })
        .collect();
    Ok(Image::new(mask.size(), weights)?)
}

/// Blend the views onto the canvas with weights normalized per pixel.
///
/// `seams[i]` is the region owned by `views[i]`, see [`crate::seam::voronoi_seams`].
pub fn blend(
    views: &[WarpedView],
    seams: &[Image<u8, 1>],
    canvas: &Roi,
    strength: f64,
) -> Result<BlendResult, StitchError> {
    let size = ImageSize {
        width: canvas.width,
        height: canvas.height,
    };
    let width = feather_width(strength, canvas);
    log::debug!("blending {} views, feather width {width:.1} px", views.len());

    let mut accum = vec![0.0f32; size.area() * 3];
    let mut weight_sum = vec![0.0f32; size.area()];
    let mut coverage = Image::<u8, 1>::from_size_val(size, 0)?;

    for (view, seam) in views.iter().zip(seams) {
        let weights = blend_weights(&view.mask, seam, width)?;
        let (ox, oy) = (
            (view.roi.x - canvas.x) as usize,
            (view.roi.y - canvas.y) as usize,
        );
        for y in 0..view.roi.height {
            for x in 0..view.roi.width {
                let local = y * view.roi.width + x;
                if view.mask.as_slice()[local] == 0 {
                    continue;
                }
                let idx = (oy + y) * canvas.width + ox + x;
                coverage.as_slice_mut()[idx] = 255;

                let w = weights.as_slice()[local];
                if w <= 0.0 {
                    continue;
                }
                weight_sum[idx] += w;
                let px = view.image.pixel(x, y);
                for c in 0..3 {
                    accum[idx * 3 + c] += w * px[c];
                }
            }
        }
    }

    for (px, &w) in accum.chunks_exact_mut(3).zip(weight_sum.iter()) {
        if w > 0.0 {
            px.iter_mut().for_each(|v| *v /= w);
        }
    }

    Ok(BlendResult {
        image: Image::new(size, accum)?,
        coverage,
    })
}
