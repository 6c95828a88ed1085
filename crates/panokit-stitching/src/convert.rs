//! Conversions between host image types and [`ImageFrame`].
//!
//! Conversions fail closed: a host buffer that does not match its declared layout is rejected
//! with a [`ConversionError`], and frames the host type cannot represent give `None`.

use panokit_image::{ImageError, ImageFrame, PixelFormat};

/// Errors raised when reading a host image.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConversionError {
    /// The host image has no pixels.
    #[error("host image is empty ({0}x{1})")]
    Empty(usize, usize),

    /// The row stride cannot hold a full row.
    #[error("row stride {stride} is smaller than the row size {row_bytes}")]
    InvalidStride {
        /// Bytes between two rows.
        stride: usize,
        /// Bytes of pixel data in a row.
        row_bytes: usize,
    },

    /// The buffer is shorter than the declared geometry.
    #[error("buffer holds {actual} bytes, expected at least {expected}")]
    BufferTooSmall {
        /// Required length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The frame could not be built.
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Pixel layouts of [`HostBitmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLayout {
    /// One byte luminance.
    Gray8,
    /// Red, green, blue.
    Rgb8,
    /// Red, green, blue, alpha.
    Rgba8,
    /// Blue, green, red, alpha, the native order of many windowing systems.
    Bgra8,
}

impl HostLayout {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            HostLayout::Gray8 => 1,
            HostLayout::Rgb8 => 3,
            HostLayout::Rgba8 | HostLayout::Bgra8 => 4,
        }
    }
}

/// A raw bitmap as handed over by a GUI toolkit, rows possibly padded.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBitmap {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Bytes between the starts of two consecutive rows.
    pub stride: usize,
    /// Pixel layout.
    pub layout: HostLayout,
    /// Pixel bytes.
    pub data: Vec<u8>,
}

impl HostBitmap {
    /// Tightly packed bitmap.
    pub fn new(width: usize, height: usize, layout: HostLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * layout.bytes_per_pixel(),
            layout,
            data,
        }
    }
}

/// Two-way conversion between a host image type and [`ImageFrame`].
pub trait HostImage: Sized {
    /// Read the host image into a frame.
    ///
    /// With `preserve_alpha` false, any alpha channel is dropped.
    fn to_frame(&self, preserve_alpha: bool) -> Result<ImageFrame, ConversionError>;

    /// Build a host image from a frame, `None` when the host type cannot hold its layout.
    fn from_frame(frame: &ImageFrame) -> Option<Self>;
}

impl HostImage for HostBitmap {
    fn to_frame(&self, preserve_alpha: bool) -> Result<ImageFrame, ConversionError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConversionError::Empty(self.width, self.height));
        }
        let bpp = self.layout.bytes_per_pixel();
        let row_bytes = self.width * bpp;
        if self.stride < row_bytes {
            return Err(ConversionError::InvalidStride {
                stride: self.stride,
                row_bytes,
            });
        }
        let expected = self.stride * (self.height - 1) + row_bytes;
        if self.data.len() < expected {
            return Err(ConversionError::BufferTooSmall {
                expected,
                actual: self.data.len(),
            });
        }

        let format = match self.layout {
            HostLayout::Gray8 => PixelFormat::Gray8,
            HostLayout::Rgb8 => PixelFormat::Rgb8,
            HostLayout::Rgba8 | HostLayout::Bgra8 if preserve_alpha => PixelFormat::Rgba8,
            HostLayout::Rgba8 | HostLayout::Bgra8 => PixelFormat::Rgb8,
        };

        let mut data = Vec::with_capacity(self.width * self.height * format.channels());
        for row in self.data.chunks(self.stride).take(self.height) {
            for px in row[..row_bytes].chunks_exact(bpp) {
                match (self.layout, format) {
                    (HostLayout::Bgra8, PixelFormat::Rgba8) => {
                        data.extend_from_slice(&[px[2], px[1], px[0], px[3]])
                    }
                    (HostLayout::Bgra8, _) => data.extend_from_slice(&[px[2], px[1], px[0]]),
                    (HostLayout::Rgba8, PixelFormat::Rgb8) => data.extend_from_slice(&px[..3]),
                    _ => data.extend_from_slice(px),
                }
            }
        }

        Ok(ImageFrame::new(
            [self.width, self.height].into(),
            format,
            data,
        )?)
    }

    fn from_frame(frame: &ImageFrame) -> Option<Self> {
        let layout = match frame.format() {
            PixelFormat::Gray8 => HostLayout::Gray8,
            PixelFormat::Rgb8 => HostLayout::Rgb8,
            PixelFormat::Rgba8 => HostLayout::Rgba8,
            PixelFormat::GrayAlpha8 => return None,
        };
        Some(HostBitmap::new(
            frame.width(),
            frame.height(),
            layout,
            frame.as_bytes().to_vec(),
        ))
    }
}

#[cfg(feature = "image")]
impl HostImage for image::DynamicImage {
    fn to_frame(&self, preserve_alpha: bool) -> Result<ImageFrame, ConversionError> {
        use image::DynamicImage;

        let (width, height) = (self.width() as usize, self.height() as usize);
        if width == 0 || height == 0 {
            return Err(ConversionError::Empty(width, height));
        }
        let size = [width, height].into();

        let frame = match self {
            DynamicImage::ImageLuma8(img) => {
                ImageFrame::new(size, PixelFormat::Gray8, img.as_raw().clone())?
            }
            DynamicImage::ImageLumaA8(img) if preserve_alpha => {
                ImageFrame::new(size, PixelFormat::GrayAlpha8, img.as_raw().clone())?
            }
            DynamicImage::ImageLumaA8(_) => {
                ImageFrame::new(size, PixelFormat::Gray8, self.to_luma8().into_raw())?
            }
            DynamicImage::ImageRgb8(img) => {
                ImageFrame::new(size, PixelFormat::Rgb8, img.as_raw().clone())?
            }
            other if preserve_alpha && other.color().has_alpha() => {
                ImageFrame::new(size, PixelFormat::Rgba8, other.to_rgba8().into_raw())?
            }
            other => ImageFrame::new(size, PixelFormat::Rgb8, other.to_rgb8().into_raw())?,
        };
        Ok(frame)
    }

    fn from_frame(frame: &ImageFrame) -> Option<Self> {
        use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

        let (w, h) = (frame.width() as u32, frame.height() as u32);
        let data = frame.as_bytes().to_vec();
        match frame.format() {
            PixelFormat::Gray8 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            PixelFormat::GrayAlpha8 => {
                GrayAlphaImage::from_raw(w, h, data).map(DynamicImage::ImageLumaA8)
            }
            PixelFormat::Rgb8 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        }
    }
}

/// Whether a host image is sharp, see [`panokit_imgproc::sharpness::is_sharp`].
///
/// Smaller thresholds admit blurrier images.
pub fn is_sharp_host<H: HostImage>(image: &H, threshold: f64) -> Result<bool, ConversionError> {
    let frame = image.to_frame(false)?;
    Ok(panokit_imgproc::sharpness::is_sharp(&frame, threshold)?)
}
