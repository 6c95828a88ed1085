//! Panorama component selection and camera estimation.
//!
//! Cameras are initialised from the pairwise homographies: a shared focal length from the
//! homography constraints and rotations chained along the maximum confidence spanning tree.
//! The result is refined with [`crate::bundle::bundle_adjust`].

use std::collections::VecDeque;

use glam::{DMat3, DVec3};
use panokit_image::ImageSize;

use crate::bundle::bundle_adjust;
use crate::camera::{orthonormalize, CameraParams};
use crate::config::{ComponentPolicy, StitchConfig};
use crate::error::StitchError;
use crate::matcher::{FrameFeatures, MatchGraph};

/// Cameras of the frames that made it into the panorama.
#[derive(Debug, Clone)]
pub struct PanoEstimate {
    /// Input indices of the surviving frames, ascending.
    pub frame_indices: Vec<usize>,
    /// One camera per surviving frame, in the order of `frame_indices`.
    pub cameras: Vec<CameraParams>,
    /// Position in `frame_indices` of the frame used as rotation reference.
    pub center: usize,
}

/// Edges of a spanning tree over frame indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanningTree {
    /// Frame with the smallest eccentricity in the tree.
    pub center: usize,
    /// `(parent, child)` pairs in breadth first order from `center`.
    pub edges: Vec<(usize, usize)>,
}

fn row_major(m: &DMat3) -> [f64; 9] {
    m.transpose().to_cols_array()
}

fn translation(tx: f64, ty: f64) -> DMat3 {
    DMat3::from_cols(
        DVec3::X,
        DVec3::Y,
        DVec3::new(tx, ty, 1.0),
    )
}

/// Pick the squared focal candidate, `v1` belongs to the denominator `d1` and `v2` to `d2`.
fn focal_candidate(d1: f64, d2: f64, v1: f64, v2: f64) -> Option<f64> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    let f_sq = match (valid(v1), valid(v2)) {
        (true, true) if d1.abs() > d2.abs() => v1,
        (true, true) => v2,
        (true, false) => v1,
        (false, true) => v2,
        (false, false) => return None,
    };
    Some(f_sq.sqrt())
}

/// Focal lengths `(f_src, f_dst)` implied by a homography between centered pixel coordinates.
///
/// Either value is `None` when the homography does not constrain it.
pub fn focals_from_homography(h: &DMat3) -> (Option<f64>, Option<f64>) {
    let h = row_major(h);

    let d1 = h[6] * h[7];
    let d2 = (h[7] - h[6]) * (h[7] + h[6]);
    let v1 = -(h[0] * h[1] + h[3] * h[4]) / d1;
    let v2 = (h[0] * h[0] + h[3] * h[3] - h[1] * h[1] - h[4] * h[4]) / d2;
    let f_dst = focal_candidate(d1, d2, v1, v2);

    let d1 = h[0] * h[3] + h[1] * h[4];
    let d2 = h[0] * h[0] + h[1] * h[1] - h[3] * h[3] - h[4] * h[4];
    let v1 = -h[2] * h[5] / d1;
    let v2 = (h[5] * h[5] - h[2] * h[2]) / d2;
    let f_src = focal_candidate(d1, d2, v1, v2);

    (f_src, f_dst)
}

/// Shared initial focal length: the median over all confident edges in `component`.
///
/// Falls back to the mean of `width + height` when no edge constrains the focal length.
pub fn estimate_focal(
    graph: &MatchGraph,
    sizes: &[ImageSize],
    component: &[usize],
    min_confidence: f64,
) -> f64 {
    let fallback = component
        .iter()
        .map(|&i| (sizes[i].width + sizes[i].height) as f64)
        .sum::<f64>()
        / component.len().max(1) as f64;

    let mut focals: Vec<f64> = graph
        .edges
        .iter()
        .filter(|e| {
            e.confidence >= min_confidence
                && component.contains(&e.src)
                && component.contains(&e.dst)
        })
        .filter_map(|e| {
            let (s, d) = (sizes[e.src], sizes[e.dst]);
            let centered = translation(-(d.width as f64) * 0.5, -(d.height as f64) * 0.5)
                * e.homography
                * translation(s.width as f64 * 0.5, s.height as f64 * 0.5);
            let scale = centered.z_axis.z;
            if scale.abs() < 1e-12 {
                return None;
            }
            match focals_from_homography(&(centered * (1.0 / scale))) {
                (Some(f0), Some(f1)) => Some((f0 * f1).sqrt()),
                _ => None,
            }
        })
        // nearly affine homographies give meaningless focal lengths
        .filter(|f| (0.1 * fallback..=10.0 * fallback).contains(f))
        .collect();

    if focals.is_empty() {
        log::warn!("no homography constrains the focal length, using {fallback:.1}");
        return fallback;
    }

    focals.sort_by(f64::total_cmp);
    let mid = focals.len() / 2;
    if focals.len() % 2 == 1 {
        focals[mid]
    } else {
        0.5 * (focals[mid - 1] + focals[mid])
    }
}

/// Maximum confidence spanning tree over `component`.
///
/// Edges are taken by decreasing confidence, ties by frame indices. The tree center minimizes
/// the longest path to any other frame, the smallest index on ties.
pub fn max_spanning_tree(
    graph: &MatchGraph,
    component: &[usize],
    min_confidence: f64,
) -> SpanningTree {
    let mut candidates: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| {
            e.confidence >= min_confidence
                && component.contains(&e.src)
                && component.contains(&e.dst)
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then((a.src, a.dst).cmp(&(b.src, b.dst)))
    });

    let mut parent: Vec<usize> = (0..graph.num_frames).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); graph.num_frames];
    for e in candidates {
        let (ra, rb) = (find(&mut parent, e.src), find(&mut parent, e.dst));
        if ra != rb {
            parent[ra] = rb;
            adjacency[e.src].push(e.dst);
            adjacency[e.dst].push(e.src);
        }
    }
    for neighbours in adjacency.iter_mut() {
        neighbours.sort_unstable();
    }

    let bfs = |start: usize| -> Vec<(usize, usize, usize)> {
        let mut visited = vec![false; graph.num_frames];
        let mut order = Vec::with_capacity(component.len());
        let mut queue = VecDeque::from([(start, start, 0usize)]);
        visited[start] = true;
        while let Some((node, from, depth)) = queue.pop_front() {
            order.push((from, node, depth));
            for &next in &adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back((next, node, depth + 1));
                }
            }
        }
        order
    };

    let mut center = component.first().copied().unwrap_or(0);
    let mut best = usize::MAX;
    for &node in component {
        let eccentricity = bfs(node).iter().map(|&(_, _, d)| d).max().unwrap_or(0);
        if eccentricity < best {
            best = eccentricity;
            center = node;
        }
    }

    let edges = bfs(center)
        .into_iter()
        .skip(1)
        .map(|(from, to, _)| (from, to))
        .collect();

    SpanningTree { center, edges }
}

/// Frames kept for the panorama according to the component policy.
///
/// # Errors
///
/// Fails when the largest component has fewer than two frames, or when
/// [`ComponentPolicy::RequireAll`] is set and some frame is not connected.
pub fn select_component(
    graph: &MatchGraph,
    config: &StitchConfig,
) -> Result<Vec<usize>, StitchError> {
    let component = graph.largest_component(config.pano_confidence_thresh);
    if component.len() < 2 {
        return Err(StitchError::ComponentTooSmall(component.len()));
    }

    let dropped: Vec<usize> = (0..graph.num_frames)
        .filter(|i| !component.contains(i))
        .collect();
    if !dropped.is_empty() {
        match config.component_policy {
            ComponentPolicy::RequireAll => return Err(StitchError::FramesDropped(dropped)),
            ComponentPolicy::LargestComponent => {
                log::warn!("dropping frames {dropped:?} outside the panorama component")
            }
        }
    }

    Ok(component)
}

/// Relative rotation `R_src^T R_dst` implied by the homography of the edge `src -> dst`.
fn relative_rotation(h: &DMat3, src: &CameraParams, dst: &CameraParams) -> DMat3 {
    // H = K_dst R_dst^T R_src K_src^-1
    orthonormalize(dst.k_inv() * *h * src.k()).transpose()
}

/// Initial cameras for `component` from the match graph, before refinement.
pub fn initial_cameras(
    graph: &MatchGraph,
    sizes: &[ImageSize],
    component: &[usize],
    min_confidence: f64,
) -> (Vec<CameraParams>, usize) {
    let focal = estimate_focal(graph, sizes, component, min_confidence);
    let tree = max_spanning_tree(graph, component, min_confidence);

    let mut cameras: Vec<CameraParams> = (0..graph.num_frames)
        .map(|i| CameraParams::new(focal, sizes[i].width, sizes[i].height))
        .collect();

    for &(from, to) in &tree.edges {
        let Some(edge) = graph.edge(from, to) else {
            continue;
        };
        let rel = relative_rotation(&edge.homography, &cameras[edge.src], &cameras[edge.dst]);
        // rel = R_src^T R_dst
        cameras[to].rotation = if edge.src == from {
            cameras[from].rotation * rel
        } else {
            cameras[from].rotation * rel.transpose()
        };
    }

    let center = component
        .iter()
        .position(|&i| i == tree.center)
        .unwrap_or(0);
    let cameras = component.iter().map(|&i| cameras[i]).collect();
    (cameras, center)
}

/// Select the panorama component and estimate one camera per surviving frame.
///
/// # Errors
///
/// Component selection errors, and [`StitchError::Estimation`] when refinement degenerates.
pub fn estimate_cameras(
    graph: &MatchGraph,
    features: &[FrameFeatures],
    sizes: &[ImageSize],
    config: &StitchConfig,
) -> Result<PanoEstimate, StitchError> {
    let frame_indices = select_component(graph, config)?;
    let (mut cameras, center) =
        initial_cameras(graph, sizes, &frame_indices, config.pano_confidence_thresh);

    log::debug!(
        "initial focal {:.1} for {} cameras, reference frame {}",
        cameras[center].focal,
        cameras.len(),
        frame_indices[center]
    );

    bundle_adjust(
        &mut cameras,
        &frame_indices,
        graph,
        features,
        config.pano_confidence_thresh,
        &config.bundle,
    )?;

    // keep the reference camera at the identity rotation
    let anchor = cameras[center].rotation.transpose();
    for cam in cameras.iter_mut() {
        cam.rotation = orthonormalize(anchor * cam.rotation);
    }

    Ok(PanoEstimate {
        frame_indices,
        cameras,
        center,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchesInfo;
    use approx::assert_relative_eq;

    fn edge(src: usize, dst: usize, confidence: f64, homography: DMat3) -> MatchesInfo {
        MatchesInfo {
            src,
            dst,
            matches: vec![],
            inliers: vec![],
            num_inliers: 0,
            homography,
            confidence,
        }
    }

    fn rotation_homography(src: &CameraParams, dst: &CameraParams) -> DMat3 {
        dst.k() * dst.rotation.transpose() * src.rotation * src.k_inv()
    }

    #[test]
    fn focal_from_rotation_homography() {
        let src = CameraParams::new(400.0, 640, 480);
        let dst = CameraParams {
            rotation: DMat3::from_rotation_y(0.2) * DMat3::from_rotation_x(0.05),
            ..src
        };
        // centered pixel coordinates
        let centered = |c: &CameraParams| CameraParams {
            ppx: 0.0,
            ppy: 0.0,
            ..*c
        };
        let h = rotation_homography(&centered(&src), &centered(&dst));
        let h = h * (1.0 / h.z_axis.z);
        let (f0, f1) = focals_from_homography(&h);
        assert_relative_eq!(f0.unwrap(), 400.0, max_relative = 1e-6);
        assert_relative_eq!(f1.unwrap(), 400.0, max_relative = 1e-6);
    }

    #[test]
    fn translation_gives_fallback_focal() {
        let sizes = vec![
            ImageSize {
                width: 100,
                height: 50,
            };
            2
        ];
        let graph = MatchGraph {
            num_frames: 2,
            edges: vec![edge(0, 1, 1.0, translation(-20.0, 0.0))],
        };
        assert_relative_eq!(estimate_focal(&graph, &sizes, &[0, 1], 0.7), 150.0);
    }

    #[test]
    fn spanning_tree_prefers_confident_edges() {
        let graph = MatchGraph {
            num_frames: 4,
            edges: vec![
                edge(0, 1, 2.0, DMat3::IDENTITY),
                edge(0, 2, 0.9, DMat3::IDENTITY),
                edge(1, 2, 1.5, DMat3::IDENTITY),
                edge(2, 3, 1.0, DMat3::IDENTITY),
            ],
        };
        let tree = max_spanning_tree(&graph, &[0, 1, 2, 3], 0.7);
        // path 0 - 1 - 2 - 3, both 1 and 2 have eccentricity 2
        assert_eq!(tree.center, 1);
        assert_eq!(tree.edges, vec![(1, 0), (1, 2), (2, 3)]);
    }

    #[test]
    fn component_policy() {
        let graph = MatchGraph {
            num_frames: 3,
            edges: vec![edge(0, 1, 1.0, DMat3::IDENTITY), edge(1, 2, 0.5, DMat3::IDENTITY)],
        };
        let config = StitchConfig::default();
        assert_eq!(select_component(&graph, &config).unwrap(), vec![0, 1]);

        let strict = StitchConfig {
            component_policy: ComponentPolicy::RequireAll,
            ..config
        };
        assert!(matches!(
            select_component(&graph, &strict),
            Err(StitchError::FramesDropped(d)) if d == vec![2]
        ));

        let lenient = StitchConfig {
            pano_confidence_thresh: 2.0,
            ..config
        };
        assert!(matches!(
            select_component(&graph, &lenient),
            Err(StitchError::ComponentTooSmall(1))
        ));
    }

    #[test]
    fn rotations_follow_the_tree() {
        let size = ImageSize {
            width: 640,
            height: 480,
        };
        let truth: Vec<CameraParams> = [0.0, 0.25, 0.5]
            .iter()
            .map(|&a| CameraParams {
                rotation: DMat3::from_rotation_y(a),
                ..CameraParams::new(500.0, size.width, size.height)
            })
            .collect();
        let graph = MatchGraph {
            num_frames: 3,
            edges: vec![
                edge(0, 1, 1.2, rotation_homography(&truth[0], &truth[1])),
                edge(1, 2, 1.1, rotation_homography(&truth[1], &truth[2])),
            ],
        };
        let sizes = vec![size; 3];
        let (cameras, center) = initial_cameras(&graph, &sizes, &[0, 1, 2], 0.7);
        assert_eq!(center, 1);
        assert!(cameras[1].rotation.abs_diff_eq(DMat3::IDENTITY, 1e-12));
        let expected = DMat3::from_rotation_y(0.25);
        assert!(cameras[2].rotation.abs_diff_eq(expected, 1e-6));
        assert!(cameras[0].rotation.abs_diff_eq(expected.transpose(), 1e-6));
    }
}
