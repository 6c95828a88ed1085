use crate::error::ImageError;
use crate::image::{Image, ImageSize};

/// Pixel layout of an [`ImageFrame`].
///
/// All formats use 8 bits per channel, interleaved, row-major, tightly packed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    /// Single luminance channel.
    Gray8,
    /// Luminance followed by alpha.
    GrayAlpha8,
    /// Red, green, blue.
    Rgb8,
    /// Red, green, blue, alpha.
    Rgba8,
}

impl PixelFormat {
    /// Number of channels per pixel.
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::GrayAlpha8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Whether the last channel carries alpha.
    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelFormat::GrayAlpha8 | PixelFormat::Rgba8)
    }

    /// Pick the format for a given channel count.
    pub fn from_channels(channels: usize) -> Result<Self, ImageError> {
        match channels {
            1 => Ok(PixelFormat::Gray8),
            2 => Ok(PixelFormat::GrayAlpha8),
            3 => Ok(PixelFormat::Rgb8),
            4 => Ok(PixelFormat::Rgba8),
            c => Err(ImageError::UnsupportedChannels(c)),
        }
    }
}

/// A dynamically typed 8-bit frame.
///
/// This is the unit exchanged with callers of the stitching pipeline: input views come in as
/// frames and the panorama goes out as one. The buffer length always equals
/// `width * height * format.channels()`.
///
/// [`ImageFrame::new`] rejects zero dimensions, the infallible conversions from [`Image`] do
/// not: a frame built from an empty image is empty too. Consumers check
/// [`ImageSize::is_empty`] themselves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFrame {
    size: ImageSize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl ImageFrame {
    /// Create a frame from an interleaved buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is zero or the buffer length does not match.
    ///
    /// # Examples
    ///
    /// ```
    /// use panokit_image::{ImageFrame, ImageSize, PixelFormat};
    ///
    /// let frame = ImageFrame::new(
    ///     ImageSize { width: 4, height: 2 },
    ///     PixelFormat::Rgb8,
    ///     vec![0u8; 4 * 2 * 3],
    /// ).unwrap();
    ///
    /// assert_eq!(frame.format().channels(), 3);
    /// ```
    pub fn new(size: ImageSize, format: PixelFormat, data: Vec<u8>) -> Result<Self, ImageError> {
        if size.is_empty() {
            return Err(ImageError::EmptyImage(size.width, size.height));
        }
        let expected = size.area() * format.channels();
        if data.len() != expected {
            return Err(ImageError::InvalidChannelShape(data.len(), expected));
        }
        Ok(Self { size, format, data })
    }

    /// Size of the frame in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Width of the frame in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height of the frame in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw interleaved bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame and return its buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Convert to a three channel RGB image, dropping alpha.
    pub fn to_rgb8(&self) -> Result<Image<u8, 3>, ImageError> {
        let c = self.format.channels();
        let mut out = Vec::with_capacity(self.size.area() * 3);
        for px in self.data.chunks_exact(c) {
            match self.format {
                PixelFormat::Gray8 | PixelFormat::GrayAlpha8 => {
                    out.extend_from_slice(&[px[0], px[0], px[0]])
                }
                PixelFormat::Rgb8 | PixelFormat::Rgba8 => out.extend_from_slice(&px[..3]),
            }
        }
        Image::new(self.size, out)
    }

    /// Convert to a four channel RGBA image. Opaque formats get alpha 255.
    pub fn to_rgba8(&self) -> Result<Image<u8, 4>, ImageError> {
        let c = self.format.channels();
        let mut out = Vec::with_capacity(self.size.area() * 4);
        for px in self.data.chunks_exact(c) {
            let rgba = match self.format {
                PixelFormat::Gray8 => [px[0], px[0], px[0], 255],
                PixelFormat::GrayAlpha8 => [px[0], px[0], px[0], px[1]],
                PixelFormat::Rgb8 => [px[0], px[1], px[2], 255],
                PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
            };
            out.extend_from_slice(&rgba);
        }
        Image::new(self.size, out)
    }

    /// Per-pixel validity mask: 255 where the pixel is visible.
    ///
    /// Opaque formats are fully valid. Alpha formats are valid where alpha is non-zero.
    pub fn alpha_mask(&self) -> Result<Image<u8, 1>, ImageError> {
        let c = self.format.channels();
        let out = match self.format {
            PixelFormat::Gray8 | PixelFormat::Rgb8 => vec![255u8; self.size.area()],
            PixelFormat::GrayAlpha8 | PixelFormat::Rgba8 => self
                .data
                .chunks_exact(c)
                .map(|px| if px[c - 1] > 0 { 255 } else { 0 })
                .collect(),
        };
        Image::new(self.size, out)
    }
}

impl From<Image<u8, 1>> for ImageFrame {
    fn from(image: Image<u8, 1>) -> Self {
        let size = image.size();
        Self {
            size,
            format: PixelFormat::Gray8,
            data: image.into_vec(),
        }
    }
}

impl From<Image<u8, 3>> for ImageFrame {
    fn from(image: Image<u8, 3>) -> Self {
        let size = image.size();
        Self {
            size,
            format: PixelFormat::Rgb8,
            data: image.into_vec(),
        }
    }
}

impl From<Image<u8, 4>> for ImageFrame {
    fn from(image: Image<u8, 4>) -> Self {
        let size = image.size();
        Self {
            size,
            format: PixelFormat::Rgba8,
            data: image.into_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_bad_input() {
        assert_eq!(
            ImageFrame::new([0, 3].into(), PixelFormat::Rgb8, vec![]),
            Err(ImageError::EmptyImage(0, 3))
        );
        assert_eq!(
            ImageFrame::new([2, 2].into(), PixelFormat::Rgba8, vec![0; 12]),
            Err(ImageError::InvalidChannelShape(12, 16))
        );
    }

    #[test]
    fn frame_conversions() -> Result<(), ImageError> {
        let frame = ImageFrame::new(
            [2, 1].into(),
            PixelFormat::GrayAlpha8,
            vec![10, 255, 200, 0],
        )?;
        let rgba = frame.to_rgba8()?;
        assert_eq!(rgba.as_slice(), &[10, 10, 10, 255, 200, 200, 200, 0]);
        let rgb = frame.to_rgb8()?;
        assert_eq!(rgb.as_slice(), &[10, 10, 10, 200, 200, 200]);
        let mask = frame.alpha_mask()?;
        assert_eq!(mask.as_slice(), &[255, 0]);
        Ok(())
    }

    #[test]
    fn frame_opaque_mask() -> Result<(), ImageError> {
        let frame = ImageFrame::new([2, 1].into(), PixelFormat::Rgb8, vec![255, 255, 255, 0, 0, 0])?;
        assert_eq!(frame.alpha_mask()?.as_slice(), &[255, 255]);
        assert!(!frame.format().has_alpha());
        Ok(())
    }

    #[test]
    fn frame_from_image() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::from_size_val([3, 2].into(), 7)?;
        let frame = ImageFrame::from(image);
        assert_eq!(frame.format(), PixelFormat::Rgb8);
        assert_eq!(frame.as_bytes().len(), 18);
        assert_eq!(PixelFormat::from_channels(5), Err(ImageError::UnsupportedChannels(5)));

        let empty = ImageFrame::from(Image::<u8, 1>::from_size_val([0, 4].into(), 0)?);
        assert!(empty.size().is_empty());
        assert!(empty.as_bytes().is_empty());
        Ok(())
    }
}
