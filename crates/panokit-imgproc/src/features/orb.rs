use std::sync::OnceLock;

use panokit_image::Image;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use super::{FastDetector, FeatureError, Keypoint};
use crate::filter::{gaussian_blur, kernels};

/// A 256 bit rotated BRIEF descriptor.
pub type OrbDescriptor = [u8; 32];

const PATTERN_SIZE: usize = 256;
const PATTERN_EXTENT: i32 = 13;
const PATTERN_SEED: u64 = 0x0b1e_f256;

/// Point pairs compared by the descriptor, fixed for the whole process.
fn sampling_pattern() -> &'static [[(i32, i32); 2]; PATTERN_SIZE] {
    static PATTERN: OnceLock<[[(i32, i32); 2]; PATTERN_SIZE]> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut pattern = [[(0, 0); 2]; PATTERN_SIZE];
        for pair in pattern.iter_mut() {
            loop {
                let p0 = (
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                );
                let p1 = (
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                );
                if p0 != p1 {
                    *pair = [p0, p1];
                    break;
                }
            }
        }
        pattern
    })
}

/// Oriented FAST keypoints with rotated BRIEF descriptors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbExtractor {
    /// Corner detector used to find keypoints.
    pub fast: FastDetector,
    /// Maximum number of keypoints kept, strongest first.
    pub max_keypoints: usize,
    /// Radius of the disc used to measure the intensity centroid.
    pub patch_radius: usize,
    /// Sigma of the smoothing applied before the binary tests.
    pub blur_sigma: f32,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self {
            fast: FastDetector::default(),
            max_keypoints: 500,
            patch_radius: 15,
            blur_sigma: 2.0,
        }
    }
}

impl OrbExtractor {
    /// Minimum distance to the image border so every sample stays inside the image.
    pub fn border(&self) -> usize {
        // rotated pattern reaches extent * sqrt(2)
        let pattern_reach = (PATTERN_EXTENT as f32 * std::f32::consts::SQRT_2).ceil() as usize + 1;
        self.patch_radius.max(pattern_reach).max(self.fast.border)
    }

    /// Detect keypoints and compute their descriptors.
    ///
    /// # Arguments
    ///
    /// * `gray` - The grayscale image.
    ///
    /// # Returns
    ///
    /// Keypoints with their orientation set and one descriptor per keypoint.
    pub fn detect_and_compute(
        &self,
        gray: &Image<u8, 1>,
    ) -> Result<(Vec<Keypoint>, Vec<OrbDescriptor>), FeatureError> {
        if !(1..=16).contains(&self.fast.arc_length) {
            return Err(FeatureError::InvalidArcLength(self.fast.arc_length));
        }
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(FeatureError::InvalidSigma(self.blur_sigma));
        }

        let detector = FastDetector {
            border: self.border(),
            ..self.fast
        };
        let mut keypoints = detector.detect(gray);
        keypoints.truncate(self.max_keypoints);

        if keypoints.is_empty() {
            return Ok((keypoints, vec![]));
        }

        let src = gray.cast::<f32>()?;
        keypoints
            .par_iter_mut()
            .for_each(|kp| kp.angle = intensity_centroid_angle(&src, kp, self.patch_radius));

        let ksize = kernels::gaussian_kernel_size(self.blur_sigma);
        let mut smoothed = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
        gaussian_blur(
            &src,
            &mut smoothed,
            (ksize, ksize),
            (self.blur_sigma, self.blur_sigma),
        )?;

        let descriptors = keypoints
            .par_iter()
            .map(|kp| rotated_brief(&smoothed, kp))
            .collect();

        Ok((keypoints, descriptors))
    }
}

/// Orientation of the vector from the keypoint to the intensity centroid of a disc.
fn intensity_centroid_angle(src: &Image<f32, 1>, kp: &Keypoint, radius: usize) -> f32 {
    let (x0, y0) = (kp.x as i32, kp.y as i32);
    let r = radius as i32;
    let (width, height) = (src.width() as i32, src.height() as i32);
    let data = src.as_slice();

    let mut m10 = 0f32;
    let mut m01 = 0f32;
    for dy in -r..=r {
        let y = y0 + dy;
        if y < 0 || y >= height {
            continue;
        }
        for dx in -r..=r {
            let x = x0 + dx;
            if dx * dx + dy * dy > r * r || x < 0 || x >= width {
                continue;
            }
            let v = data[src.size().index(y as usize, x as usize)];
            m10 += v * dx as f32;
            m01 += v * dy as f32;
        }
    }

    m01.atan2(m10)
}

fn rotated_brief(src: &Image<f32, 1>, kp: &Keypoint) -> OrbDescriptor {
    let (sin_a, cos_a) = kp.angle.sin_cos();
    let (width, height) = (src.width() as i32, src.height() as i32);
    let data = src.as_slice();
    let (kx, ky) = (kp.x.round() as i32, kp.y.round() as i32);

    let sample = |(px, py): (i32, i32)| -> Option<f32> {
        let (px, py) = (px as f32, py as f32);
        let x = kx + (cos_a * px - sin_a * py).round() as i32;
        let y = ky + (sin_a * px + cos_a * py).round() as i32;
        if x < 0 || x >= width || y < 0 || y >= height {
            return None;
        }
        Some(data[src.size().index(y as usize, x as usize)])
    };

    let mut descriptor = [0u8; 32];
    for (j, [p0, p1]) in sampling_pattern().iter().enumerate() {
        if let (Some(v0), Some(v1)) = (sample(*p0), sample(*p1)) {
            if v0 < v1 {
                descriptor[j / 8] |= 1 << (j % 8);
            }
        }
    }
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(width: usize, height: usize, offset: usize, seed: u64) -> Image<u8, 1> {
        let mut rng = StdRng::seed_from_u64(seed);
        let (bw, bh) = (32, 16);
        let values: Vec<u8> = (0..bw * bh).map(|_| rng.random_range(30..=255)).collect();
        Image::from_fn([width, height].into(), |x, y| {
            [values[(y / 8) * bw + (x + offset) / 8]]
        })
        .unwrap()
    }

    #[test]
    fn pattern_is_stable() {
        let a = sampling_pattern();
        let b = sampling_pattern();
        assert_eq!(a, b);
        assert!(a
            .iter()
            .flatten()
            .all(|&(x, y)| x.abs() <= PATTERN_EXTENT && y.abs() <= PATTERN_EXTENT));
    }

    #[test]
    fn orb_keypoints_inside_border() -> Result<(), FeatureError> {
        let image = blocks(96, 80, 0, 7);
        let orb = OrbExtractor::default();
        let (kps, desc) = orb.detect_and_compute(&image)?;
        assert_eq!(kps.len(), desc.len());
        assert!(!kps.is_empty());
        let border = orb.border() as f32;
        for kp in &kps {
            assert!(kp.x >= border && kp.x < 96.0 - border);
            assert!(kp.y >= border && kp.y < 80.0 - border);
        }
        Ok(())
    }

    #[test]
    fn orb_rejects_bad_config() {
        let image = blocks(64, 64, 0, 1);
        let orb = OrbExtractor {
            blur_sigma: 0.0,
            ..Default::default()
        };
        assert_eq!(
            orb.detect_and_compute(&image),
            Err(FeatureError::InvalidSigma(0.0))
        );
    }

    #[test]
    fn orb_descriptors_follow_translation() -> Result<(), FeatureError> {
        // the second view is the first one shifted 16 pixels to the left
        let a = blocks(120, 80, 0, 11);
        let b = blocks(120, 80, 16, 11);
        let orb = OrbExtractor::default();
        let (kps_a, desc_a) = orb.detect_and_compute(&a)?;
        let (kps_b, desc_b) = orb.detect_and_compute(&b)?;

        // skip keypoints whose smoothed neighbourhood touches the image border
        let margin = (orb.border() + 7) as f32;
        let mut same = 0;
        for (kb, db) in kps_b.iter().zip(desc_b.iter()) {
            if kb.x < margin || kb.x + 16.0 >= 120.0 - margin {
                continue;
            }
            if let Some(i) = kps_a
                .iter()
                .position(|ka| ka.x == kb.x + 16.0 && ka.y == kb.y)
            {
                assert_eq!(&desc_a[i], db);
                approx::assert_relative_eq!(kps_a[i].angle, kb.angle, epsilon = 1e-5);
                same += 1;
            }
        }
        assert!(same > 0);
        Ok(())
    }
}
