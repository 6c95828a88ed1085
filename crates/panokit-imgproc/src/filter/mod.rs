//! Separable blurs and the Laplacian used by the focus measure.

/// 1D kernels and stencils.
pub mod kernels;

mod ops;
pub use ops::*;

mod separable_filter;
pub use separable_filter::*;
