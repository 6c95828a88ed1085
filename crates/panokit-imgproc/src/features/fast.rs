use panokit_image::Image;
use rayon::prelude::*;

use super::Keypoint;

/// Bresenham circle of radius 3 as `(dx, dy)`, clockwise starting at the top.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// FAST corner detector with 3x3 non-maximum suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastDetector {
    /// Minimum absolute intensity difference to the center pixel.
    pub threshold: u8,
    /// Number of contiguous circle pixels that must be all brighter or all darker.
    pub arc_length: u8,
    /// Pixels closer than this to the image border are never reported.
    pub border: usize,
}

impl Default for FastDetector {
    fn default() -> Self {
        Self {
            threshold: 20,
            arc_length: 9,
            border: 3,
        }
    }
}

impl FastDetector {
    /// Detect corners in a grayscale image.
    ///
    /// # Returns
    ///
    /// The keypoints sorted by descending response, ties broken by row then column.
    pub fn detect(&self, src: &Image<u8, 1>) -> Vec<Keypoint> {
        let (cols, rows) = (src.cols(), src.rows());
        let border = self.border.max(3);
        if cols <= 2 * border || rows <= 2 * border {
            return vec![];
        }

        let offsets = CIRCLE.map(|(dx, dy)| dy as isize * cols as isize + dx as isize);
        let data = src.as_slice();

        // score map, zero where there is no corner
        let mut scores = vec![0i32; cols * rows];
        scores
            .par_chunks_exact_mut(cols)
            .enumerate()
            .skip(border)
            .take(rows - 2 * border)
            .for_each(|(y, row)| {
                for (x, score) in row.iter_mut().enumerate().take(cols - border).skip(border) {
                    *score = corner_score(
                        data,
                        y * cols + x,
                        &offsets,
                        self.threshold,
                        self.arc_length,
                    );
                }
            });

        let mut keypoints: Vec<Keypoint> = (border..rows - border)
            .into_par_iter()
            .flat_map_iter(|y| {
                let scores = &scores;
                (border..cols - border).filter_map(move |x| {
                    let s = scores[y * cols + x];
                    if s > 0 && is_local_max(scores, cols, x, y) {
                        Some(Keypoint::new(x as f32, y as f32, s as f32))
                    } else {
                        None
                    }
                })
            })
            .collect();

        keypoints.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.y.total_cmp(&b.y))
                .then(a.x.total_cmp(&b.x))
        });

        keypoints
    }
}

/// Keep the pixel if no neighbour scores higher, equal scores keep the first in raster order.
fn is_local_max(scores: &[i32], cols: usize, x: usize, y: usize) -> bool {
    let s = scores[y * cols + x];
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let n = scores[(y as isize + dy) as usize * cols + (x as isize + dx) as usize];
            let before = dy < 0 || (dy == 0 && dx < 0);
            if n > s || (n == s && before) {
                return false;
            }
        }
    }
    true
}

/// Segment test plus the sum of absolute differences over the best arc.
///
/// Returns `0` when the pixel is not a corner.
fn corner_score(
    src: &[u8],
    pixel_idx: usize,
    offsets: &[isize; 16],
    threshold: u8,
    arc_length: u8,
) -> i32 {
    let center = src[pixel_idx];
    let lower = center.saturating_sub(threshold);
    let upper = center.saturating_add(threshold);

    let mut pixels = [0u8; 16];
    let mut bright = 0u32;
    let mut dark = 0u32;
    for (i, off) in offsets.iter().enumerate() {
        let p = src[(pixel_idx as isize + off) as usize];
        pixels[i] = p;
        if p > upper {
            bright |= 1 << i;
        } else if p < lower {
            dark |= 1 << i;
        }
    }

    let arc = arc_length as usize;
    let best = [bright, dark]
        .into_iter()
        .filter_map(|mask| {
            // duplicate the ring so windows can wrap around
            let ring = mask | (mask << 16);
            let window = (1u32 << arc) - 1;
            (0..16)
                .filter(|&start| (ring >> start) & window == window)
                .map(|start| {
                    (start..start + arc)
                        .map(|k| (center.abs_diff(pixels[k % 16]) - threshold) as i32)
                        .sum::<i32>()
                })
                .max()
        })
        .max();

    // a corner whose arc sits exactly at the threshold still counts
    best.map(|s| s + 1).unwrap_or(0)
}
