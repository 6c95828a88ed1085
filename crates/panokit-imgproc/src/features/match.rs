use rayon::prelude::*;

/// Hamming distance between two fixed-size byte descriptors.
#[inline]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum()
}

/// A putative correspondence between two descriptor sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    /// Index into the query descriptors.
    pub query: usize,
    /// Index into the train descriptors.
    pub train: usize,
    /// Hamming distance of the pair.
    pub distance: u32,
}

/// Best and second best neighbour of every descriptor of `from` inside `to`.
fn nearest_two<const N: usize>(from: &[[u8; N]], to: &[[u8; N]]) -> Vec<(usize, u32, u32)> {
    from.par_iter()
        .map(|d1| {
            let mut best = (0usize, u32::MAX);
            let mut second = u32::MAX;
            for (j, d2) in to.iter().enumerate() {
                let dist = hamming_distance(d1, d2);
                if dist < best.1 {
                    second = best.1;
                    best = (j, dist);
                } else if dist < second {
                    second = dist;
                }
            }
            (best.0, best.1, second)
        })
        .collect()
}

/// Match binary descriptors using brute-force Hamming distance.
///
/// For each descriptor in `descriptors1`, finds the nearest neighbor in `descriptors2`.
/// Optionally filters matches by maximum distance, cross-check, and Lowe's ratio test.
///
/// # Arguments
///
/// * `descriptors1` - First set of N-byte binary descriptors.
/// * `descriptors2` - Second set of N-byte binary descriptors.
/// * `max_distance` - If set, discard matches with Hamming distance above this threshold.
/// * `cross_check` - If true, keep only mutual nearest neighbors.
/// * `max_ratio` - If set, apply Lowe's ratio test (best / second-best < ratio).
///
/// # Returns
///
/// The surviving matches ordered by query index.
pub fn match_descriptors<const N: usize>(
    descriptors1: &[[u8; N]],
    descriptors2: &[[u8; N]],
    max_distance: Option<u32>,
    cross_check: bool,
    max_ratio: Option<f32>,
) -> Vec<DescriptorMatch> {
    if descriptors1.is_empty() || descriptors2.is_empty() {
        return vec![];
    }

    let forward = nearest_two(descriptors1, descriptors2);
    let reverse = cross_check.then(|| nearest_two(descriptors2, descriptors1));

    let mut matches = Vec::new();
    for (i, &(j, best_dist, second_dist)) in forward.iter().enumerate() {
        if let Some(max_dist) = max_distance {
            if best_dist > max_dist {
                continue;
            }
        }

        if let Some(rev) = &reverse {
            if rev[j].0 != i {
                continue;
            }
        }

        if let Some(ratio) = max_ratio {
            if ratio < 1.0 && second_dist != u32::MAX {
                let denom = if second_dist == 0 {
                    f32::EPSILON
                } else {
                    second_dist as f32
                };
                if best_dist as f32 / denom >= ratio {
                    continue;
                }
            }
        }

        matches.push(DescriptorMatch {
            query: i,
            train: j,
            distance: best_dist,
        });
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming() {
        assert_eq!(hamming_distance(&[0b1010, 0xff], &[0b0110, 0x00]), 10);
    }

    #[test]
    fn match_identical_sets() {
        let d: Vec<[u8; 4]> = vec![[0, 0, 0, 0], [0xff, 0xff, 0, 0], [0, 0, 0xff, 0xff]];
        let matches = match_descriptors(&d, &d, None, true, Some(0.8));
        assert_eq!(matches.len(), 3);
        for m in matches {
            assert_eq!(m.query, m.train);
            assert_eq!(m.distance, 0);
        }
    }

    #[test]
    fn match_ratio_rejects_ambiguous() {
        let query: Vec<[u8; 2]> = vec![[0b0000_0001, 0]];
        let train: Vec<[u8; 2]> = vec![[0b0000_0011, 0], [0b0000_0101, 0]];
        assert!(match_descriptors(&query, &train, None, false, Some(0.8)).is_empty());
        assert_eq!(match_descriptors(&query, &train, None, false, None).len(), 1);
    }

    #[test]
    fn match_cross_check() {
        let query: Vec<[u8; 1]> = vec![[0b0000_0000], [0b0000_0001]];
        let train: Vec<[u8; 1]> = vec![[0b0000_0001]];
        let matches = match_descriptors(&query, &train, None, true, None);
        assert_eq!(
            matches,
            vec![DescriptorMatch {
                query: 1,
                train: 0,
                distance: 0
            }]
        );
        assert_eq!(match_descriptors(&query, &train, Some(0), false, None).len(), 1);
    }
}
