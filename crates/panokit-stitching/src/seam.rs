//! Voronoi seam finding on the distance to each footprint border.

use panokit_image::{Image, ImageSize};
use panokit_imgproc::distance_transform::distance_transform;

use crate::error::StitchError;
use crate::warper::{Roi, WarpedView};

/// Distance of every footprint pixel to the footprint border, the ROI edge counting as border.
fn border_distance(mask: &Image<u8, 1>) -> Result<Image<f32, 1>, StitchError> {
    let (cols, rows) = (mask.cols(), mask.rows());
    let padded_size = ImageSize {
        width: cols + 2,
        height: rows + 2,
    };
    let mut padded = Image::<u8, 1>::from_size_val(padded_size, 0)?;
    for (r, row) in mask.as_slice().chunks_exact(cols).enumerate() {
        let start = (r + 1) * (cols + 2) + 1;
        padded.as_slice_mut()[start..start + cols].copy_from_slice(row);
    }

    let mut dist = Image::<f32, 1>::from_size_val(padded_size, 0.0)?;
    distance_transform(&padded, &mut dist)?;

    let inner: Vec<f32> = dist
        .as_slice()
        .chunks_exact(cols + 2)
        .skip(1)
        .take(rows)
        .flat_map(|row| row[1..=cols].iter().copied())
        .collect();
    Ok(Image::new(mask.size(), inner)?)
}

/// Split the canvas between the views: every pixel goes to the view in which it lies deepest.
///
/// Ties go to the view with the lower index.
///
/// # Returns
///
/// One mask per view, in the view's ROI coordinates, 255 where the view owns the pixel.
pub fn voronoi_seams(views: &[WarpedView], canvas: &Roi) -> Result<Vec<Image<u8, 1>>, StitchError> {
    let canvas_len = canvas.area();
    let mut best = vec![0.0f32; canvas_len];
    let mut owner = vec![usize::MAX; canvas_len];

    for (i, view) in views.iter().enumerate() {
        let dist = border_distance(&view.mask)?;
        let (ox, oy) = (
            (view.roi.x - canvas.x) as usize,
            (view.roi.y - canvas.y) as usize,
        );
        for y in 0..view.roi.height {
            for x in 0..view.roi.width {
                let d = dist.as_slice()[y * view.roi.width + x];
                if d <= 0.0 {
                    continue;
                }
                let idx = (oy + y) * canvas.width + ox + x;
                if d > best[idx] {
                    best[idx] = d;
                    owner[idx] = i;
                }
            }
        }
    }

    views
        .iter()
        .enumerate()
        .map(|(i, view)| {
            let (ox, oy) = (
                (view.roi.x - canvas.x) as usize,
                (view.roi.y - canvas.y) as usize,
            );
            let size = ImageSize {
                width: view.roi.width,
                height: view.roi.height,
            };
            Ok(Image::from_fn(size, |x, y| {
                let idx = (oy + y) * canvas.width + ox + x;
                [if owner[idx] == i { 255 } else { 0 }]
            })?)
        })
        .collect()
}
