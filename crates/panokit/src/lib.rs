#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use panokit_image as image;

#[doc(inline)]
pub use panokit_imgproc as imgproc;

#[doc(inline)]
pub use panokit_stitching as stitching;
