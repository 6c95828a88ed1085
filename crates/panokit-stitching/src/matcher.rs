//! Feature detection per frame and pairwise matching into a match graph.

use glam::{DMat3, DVec2};
use panokit_image::{Image, ImageFrame, ImageSize};
use panokit_imgproc::{
    color::gray_from_frame,
    features::{match_descriptors, FastDetector, Keypoint, OrbDescriptor, OrbExtractor},
    interpolation::InterpolationMode,
    resize::resize_native,
};
use rayon::prelude::*;

use crate::config::{FeatureConfig, MatcherConfig};
use crate::error::StitchError;
use crate::homography::ransac_homography;

/// Keypoints and descriptors of one frame, in full resolution pixel coordinates.
#[derive(Debug, Clone, Default)]
pub struct FrameFeatures {
    /// Detected keypoints.
    pub keypoints: Vec<Keypoint>,
    /// One descriptor per keypoint.
    pub descriptors: Vec<OrbDescriptor>,
}

impl FrameFeatures {
    /// Position of keypoint `idx`.
    pub fn point(&self, idx: usize) -> DVec2 {
        let kp = &self.keypoints[idx];
        DVec2::new(kp.x as f64, kp.y as f64)
    }
}

/// Geometrically verified matches between two frames, one edge of the match graph.
#[derive(Debug, Clone)]
pub struct MatchesInfo {
    /// Index of the source frame.
    pub src: usize,
    /// Index of the destination frame, always greater than `src`.
    pub dst: usize,
    /// Keypoint index pairs `(src, dst)`.
    pub matches: Vec<(usize, usize)>,
    /// Homography inlier flag per match.
    pub inliers: Vec<bool>,
    /// Number of inliers.
    pub num_inliers: usize,
    /// Homography mapping source pixels to destination pixels.
    pub homography: DMat3,
    /// Pair confidence, `inliers / (8 + 0.3 * matches)`.
    pub confidence: f64,
}

impl MatchesInfo {
    /// Iterate the inlier keypoint pairs.
    pub fn inlier_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.matches
            .iter()
            .zip(self.inliers.iter())
            .filter(|(_, &inlier)| inlier)
            .map(|(m, _)| *m)
    }
}

/// Frames as nodes, verified pairwise matches as edges.
#[derive(Debug, Clone, Default)]
pub struct MatchGraph {
    /// Number of frames, including frames without edges.
    pub num_frames: usize,
    /// Edges sorted by `(src, dst)`.
    pub edges: Vec<MatchesInfo>,
}

impl MatchGraph {
    /// The edge between `a` and `b` in either direction.
    pub fn edge(&self, a: usize, b: usize) -> Option<&MatchesInfo> {
        let (src, dst) = if a < b { (a, b) } else { (b, a) };
        self.edges.iter().find(|e| e.src == src && e.dst == dst)
    }

    /// Connected components using only edges with `confidence >= min_confidence`.
    ///
    /// Every component is sorted ascending and the components are ordered by their first frame.
    pub fn components(&self, min_confidence: f64) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..self.num_frames).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for e in self.edges.iter().filter(|e| e.confidence >= min_confidence) {
            let (ra, rb) = (find(&mut parent, e.src), find(&mut parent, e.dst));
            if ra != rb {
                // keep the smaller index as root so the labelling is stable
                parent[ra.max(rb)] = ra.min(rb);
            }
        }

        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut slot = vec![usize::MAX; self.num_frames];
        for i in 0..self.num_frames {
            let root = find(&mut parent, i);
            if slot[root] == usize::MAX {
                slot[root] = components.len();
                components.push(Vec::new());
            }
            components[slot[root]].push(i);
        }
        components
    }

    /// Largest component above `min_confidence`, the earliest one on ties.
    pub fn largest_component(&self, min_confidence: f64) -> Vec<usize> {
        let mut best: Vec<usize> = Vec::new();
        for c in self.components(min_confidence) {
            if c.len() > best.len() {
                best = c;
            }
        }
        best
    }
}

/// Uniform scale applied to every frame so the largest one fits in `max_mpx` megapixels.
pub fn registration_scale(sizes: &[ImageSize], max_mpx: f64) -> f64 {
    let max_pixels = (max_mpx * 1e6).round() as usize;
    sizes
        .iter()
        .map(|s| panokit_imgproc::resize::size_for_max_area(*s, max_pixels).1)
        .fold(1.0, f64::min)
}

fn registration_image(frame: &ImageFrame, scale: f64) -> Result<Image<u8, 1>, StitchError> {
    let gray = gray_from_frame(frame)?;
    if scale >= 1.0 {
        return Ok(gray);
    }
    let size = ImageSize {
        width: ((frame.width() as f64 * scale).round() as usize).max(1),
        height: ((frame.height() as f64 * scale).round() as usize).max(1),
    };
    let mut small = Image::<u8, 1>::from_size_val(size, 0)?;
    resize_native(&gray, &mut small, InterpolationMode::Bilinear)?;
    Ok(small)
}

/// Detect ORB features on every frame at registration resolution.
///
/// Keypoints are mapped back to full resolution coordinates.
pub fn find_features(
    frames: &[ImageFrame],
    scale: f64,
    config: &FeatureConfig,
) -> Result<Vec<FrameFeatures>, StitchError> {
    let extractor = OrbExtractor {
        fast: FastDetector {
            threshold: config.fast_threshold,
            arc_length: config.fast_arc_length,
            ..Default::default()
        },
        max_keypoints: config.max_keypoints,
        blur_sigma: config.blur_sigma,
        ..Default::default()
    };

    frames
        .par_iter()
        .enumerate()
        .map(|(index, frame)| {
            let gray = registration_image(frame, scale)?;
            let (mut keypoints, descriptors) = extractor.detect_and_compute(&gray)?;
            if scale < 1.0 {
                let inv = (1.0 / scale) as f32;
                for kp in keypoints.iter_mut() {
                    kp.x = (kp.x + 0.5) * inv - 0.5;
                    kp.y = (kp.y + 0.5) * inv - 0.5;
                }
            }
            log::debug!("frame {index}: {} keypoints", keypoints.len());
            Ok(FrameFeatures {
                keypoints,
                descriptors,
            })
        })
        .collect()
}

fn pair_seed(base: u64, src: usize, dst: usize) -> u64 {
    base ^ (((src as u64) << 32) | dst as u64)
}

/// Match and verify one frame pair, `None` when the pair is not confident enough.
pub fn match_pair(
    features: &[FrameFeatures],
    src: usize,
    dst: usize,
    config: &MatcherConfig,
) -> Option<MatchesInfo> {
    let (f1, f2) = (&features[src], &features[dst]);
    let matches: Vec<(usize, usize)> = match_descriptors(
        &f1.descriptors,
        &f2.descriptors,
        None,
        config.cross_check,
        Some(config.ratio),
    )
    .into_iter()
    .map(|m| (m.query, m.train))
    .collect();

    if matches.len() < config.min_inliers.max(4) {
        log::trace!("pair ({src}, {dst}): only {} matches", matches.len());
        return None;
    }

    let p1: Vec<DVec2> = matches.iter().map(|&(q, _)| f1.point(q)).collect();
    let p2: Vec<DVec2> = matches.iter().map(|&(_, t)| f2.point(t)).collect();
    let fit = ransac_homography(
        &p1,
        &p2,
        &config.ransac,
        pair_seed(config.ransac.random_seed, src, dst),
    )
    .ok()?;

    let confidence = fit.inlier_count as f64 / (8.0 + 0.3 * matches.len() as f64);
    log::trace!(
        "pair ({src}, {dst}): {} matches, {} inliers, confidence {confidence:.3}",
        matches.len(),
        fit.inlier_count
    );

    if fit.inlier_count < config.min_inliers || confidence <= config.match_confidence {
        return None;
    }

    Some(MatchesInfo {
        src,
        dst,
        matches,
        inliers: fit.inliers,
        num_inliers: fit.inlier_count,
        homography: fit.model,
        confidence,
    })
}

/// Match every frame pair, or only pairs closer than `range_width`, and build the graph.
///
/// # Errors
///
/// Fails when no pair passes the matching threshold.
pub fn build_match_graph(
    features: &[FrameFeatures],
    config: &MatcherConfig,
) -> Result<MatchGraph, StitchError> {
    let n = features.len();
    let range = config.range_width.unwrap_or(n);
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .filter(|&(i, j)| j - i < range)
        .collect();

    // collect keeps the canonical pair order
    let edges: Vec<MatchesInfo> = pairs
        .par_iter()
        .filter_map(|&(i, j)| match_pair(features, i, j, config))
        .collect();

    log::debug!(
        "matched {} pairs, {} edges above confidence {}",
        pairs.len(),
        edges.len(),
        config.match_confidence
    );

    if edges.is_empty() {
        return Err(StitchError::NoMatches(config.match_confidence));
    }

    Ok(MatchGraph {
        num_frames: n,
        edges,
    })
}
