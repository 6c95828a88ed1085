/// Sampled gaussian of `kernel_size` taps, normalized to sum to one.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    let center = (kernel_size as f32 - 1.0) * 0.5;
    let denom = 2.0 * sigma * sigma;
    let taps: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let d = i as f32 - center;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Odd kernel size covering `±3 sigma`.
pub fn gaussian_kernel_size(sigma: f32) -> usize {
    let half = (3.0 * sigma).ceil().max(1.0) as usize;
    2 * half + 1
}

/// The 4-neighbour Laplacian stencil `[0, 1, 0; 1, -4, 1; 0, 1, 0]`, row-major.
pub const LAPLACIAN_3X3: [[f32; 3]; 3] = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];
