use panokit_image::{Image, ImageError};

const AXIAL: f32 = 1.0;
const DIAGONAL: f32 = std::f32::consts::SQRT_2;

/// Distance from every pixel to the closest zero pixel.
///
/// Two-pass 3x3 chamfer approximation of the euclidean distance. Zero pixels map to `0.0`.
/// The area outside the image is not treated as zero, so a mask without any zero pixel
/// maps to `f32::INFINITY` everywhere.
///
/// # Arguments
///
/// * `src` - The input mask, zero marks the background.
/// * `dst` - The output distances, same size as `src`.
pub fn distance_transform(src: &Image<u8, 1>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let (rows, cols) = (src.rows(), src.cols());
    let mask = src.as_slice();
    let dist = dst.as_slice_mut();

    for (d, &m) in dist.iter_mut().zip(mask.iter()) {
        *d = if m == 0 { 0.0 } else { f32::INFINITY };
    }

    // forward pass
    for r in 0..rows {
        for c in 0..cols {
            let idx = r * cols + c;
            let mut best = dist[idx];
            if best == 0.0 {
                continue;
            }
            if c > 0 {
                best = best.min(dist[idx - 1] + AXIAL);
            }
            if r > 0 {
                let up = idx - cols;
                best = best.min(dist[up] + AXIAL);
                if c > 0 {
                    best = best.min(dist[up - 1] + DIAGONAL);
                }
                if c + 1 < cols {
                    best = best.min(dist[up + 1] + DIAGONAL);
                }
            }
            dist[idx] = best;
        }
    }

    // backward pass
    for r in (0..rows).rev() {
        for c in (0..cols).rev() {
            let idx = r * cols + c;
            let mut best = dist[idx];
            if best == 0.0 {
                continue;
            }
            if c + 1 < cols {
                best = best.min(dist[idx + 1] + AXIAL);
            }
            if r + 1 < rows {
                let down = idx + cols;
                best = best.min(dist[down] + AXIAL);
                if c + 1 < cols {
                    best = best.min(dist[down + 1] + DIAGONAL);
                }
                if c > 0 {
                    best = best.min(dist[down - 1] + DIAGONAL);
                }
            }
            dist[idx] = best;
        }
    }

    Ok(())
}

/// Signed distance to the mask border: positive inside, negative outside.
///
/// Inside pixels get their distance to the closest background pixel, background pixels get
/// minus their distance to the closest foreground pixel.
pub fn signed_distance_transform(
    src: &Image<u8, 1>,
    dst: &mut Image<f32, 1>,
) -> Result<(), ImageError> {
    let inverted = Image::<u8, 1>::new(
        src.size(),
        src.as_slice()
            .iter()
            .map(|&m| if m == 0 { 255 } else { 0 })
            .collect(),
    )?;

    let mut outside = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    distance_transform(src, dst)?;
    distance_transform(&inverted, &mut outside)?;

    for ((d, &o), &m) in dst
        .as_slice_mut()
        .iter_mut()
        .zip(outside.as_slice())
        .zip(src.as_slice())
    {
        if m == 0 {
            *d = -o;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_transform_line() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::new([5, 1].into(), vec![0, 1, 1, 1, 1])?;
        let mut dst = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
        distance_transform(&src, &mut dst)?;
        assert_eq!(dst.as_slice(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn distance_transform_diagonal() -> Result<(), ImageError> {
        #[rustfmt::skip]
        let src = Image::<u8, 1>::new(
            [3, 3].into(),
            vec![
                0, 1, 1,
                1, 1, 1,
                1, 1, 1,
            ],
        )?;
        let mut dst = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
        distance_transform(&src, &mut dst)?;
        approx::assert_relative_eq!(dst.as_slice()[4], std::f32::consts::SQRT_2);
        approx::assert_relative_eq!(dst.as_slice()[8], 2.0 * std::f32::consts::SQRT_2);
        Ok(())
    }

    #[test]
    fn distance_transform_no_background() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::from_size_val([3, 2].into(), 255)?;
        let mut dst = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
        distance_transform(&src, &mut dst)?;
        assert!(dst.as_slice().iter().all(|d| d.is_infinite()));
        Ok(())
    }

    #[test]
    fn signed_distance() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::new([6, 1].into(), vec![255, 255, 255, 0, 0, 0])?;
        let mut dst = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
        signed_distance_transform(&src, &mut dst)?;
        assert_eq!(dst.as_slice(), &[3.0, 2.0, 1.0, -1.0, -2.0, -3.0]);
        Ok(())
    }
}
