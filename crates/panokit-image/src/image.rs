use crate::error::ImageError;

/// Width and height of an image in pixels.
///
/// # Examples
///
/// ```
/// use panokit_image::ImageSize;
///
/// let size: ImageSize = [640, 480].into();
/// assert_eq!(size.area(), 307_200);
/// assert_eq!(size.to_string(), "640x480");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageSize {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl ImageSize {
    /// Number of pixels covered by the size.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether one of the dimensions is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Linear pixel index of `(row, col)` in a single channel buffer.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from([width, height]: [usize; 2]) -> Self {
        ImageSize { width, height }
    }
}

/// Pixel component types the resampling and filtering code can work with.
///
/// `Send + Sync` lets images be processed by rows in parallel.
pub trait ImageDtype: Copy + Default + Into<f32> + Send + Sync {
    /// Convert back from the `f32` working type, saturating where needed.
    fn from_f32(x: f32) -> Self;
}

impl ImageDtype for f32 {
    fn from_f32(x: f32) -> Self {
        x
    }
}

impl ImageDtype for u8 {
    fn from_f32(x: f32) -> Self {
        x.round().clamp(0.0, 255.0) as u8
    }
}

/// Raster with a compile-time channel count.
///
/// Pixels are stored interleaved and row-major, so the buffer has shape `(H, W, C)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T, const CHANNELS: usize> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T, const CHANNELS: usize> Image<T, CHANNELS> {
    /// Wrap an interleaved pixel buffer.
    ///
    /// # Errors
    ///
    /// [`ImageError::InvalidChannelShape`] when `data` does not hold exactly
    /// `width * height * CHANNELS` values.
    ///
    /// # Examples
    ///
    /// ```
    /// use panokit_image::Image;
    ///
    /// let mask = Image::<u8, 1>::new([4, 2].into(), vec![255; 8]).unwrap();
    /// assert_eq!(mask.num_channels(), 1);
    /// assert!(Image::<u8, 3>::new([4, 2].into(), vec![0; 8]).is_err());
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        let expected = size.area() * CHANNELS;
        if data.len() != expected {
            return Err(ImageError::InvalidChannelShape(data.len(), expected));
        }
        Ok(Self { size, data })
    }

    /// Image of `size` with every component set to `val`.
    pub fn from_size_val(size: ImageSize, val: T) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        Image::new(size, vec![val; size.area() * CHANNELS])
    }

    /// Image whose pixel at `(x, y)` is `f(x, y)`.
    pub fn from_fn(
        size: ImageSize,
        f: impl Fn(usize, usize) -> [T; CHANNELS],
    ) -> Result<Self, ImageError>
    where
        T: Copy,
    {
        let data = (0..size.height)
            .flat_map(|y| (0..size.width).map(move |x| (x, y)))
            .flat_map(|(x, y)| f(x, y))
            .collect();
        Image::new(size, data)
    }

    /// Size in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Number of columns, same as [`Image::width`].
    pub fn cols(&self) -> usize {
        self.size.width
    }

    /// Number of rows, same as [`Image::height`].
    pub fn rows(&self) -> usize {
        self.size.height
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Number of interleaved channels.
    pub fn num_channels(&self) -> usize {
        CHANNELS
    }

    /// Interleaved pixel buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Interleaved pixel buffer, mutable.
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Take the pixel buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Component at `[row, col, channel]`, `None` when out of bounds.
    pub fn get(&self, index: [usize; 3]) -> Option<&T> {
        let [y, x, c] = index;
        if y >= self.rows() || x >= self.cols() || c >= CHANNELS {
            return None;
        }
        self.data.get(self.size.index(y, x) * CHANNELS + c)
    }

    /// Components of the pixel at `(x, y)`.
    ///
    /// PRECONDITION: `x < width` and `y < height`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[T] {
        let base = self.size.index(y, x) * CHANNELS;
        &self.data[base..base + CHANNELS]
    }

    /// Copy out a single channel.
    pub fn channel(&self, channel: usize) -> Result<Image<T, 1>, ImageError>
    where
        T: Copy,
    {
        if channel >= CHANNELS {
            return Err(ImageError::ChannelIndexOutOfBounds(channel, CHANNELS));
        }
        let plane = self.data.iter().skip(channel).step_by(CHANNELS).copied();
        Image::new(self.size, plane.collect())
    }

    /// Every channel as its own image, in channel order.
    pub fn split_channels(&self) -> Result<Vec<Image<T, 1>>, ImageError>
    where
        T: Copy,
    {
        (0..CHANNELS).map(|c| self.channel(c)).collect()
    }

    /// Convert every component with [`num_traits::NumCast`].
    ///
    /// # Errors
    ///
    /// [`ImageError::CastError`] when a value does not fit the target type.
    pub fn cast<U>(&self) -> Result<Image<U, CHANNELS>, ImageError>
    where
        U: num_traits::NumCast,
        T: num_traits::NumCast + Copy,
    {
        let data = self
            .data
            .iter()
            .map(|&v| U::from(v).ok_or(ImageError::CastError))
            .collect::<Result<Vec<U>, _>>()?;
        Image::new(self.size, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_helpers() {
        let size = ImageSize::from([10, 20]);
        assert_eq!(size.area(), 200);
        assert!(!size.is_empty());
        assert!(ImageSize::from([0, 4]).is_empty());
        assert_eq!(size.index(2, 3), 23);
        assert_eq!(size.to_string(), "10x20");
    }

    #[test]
    fn buffer_length_is_checked() {
        let res = Image::<u8, 3>::new([2, 2].into(), vec![0u8; 5]);
        assert_eq!(res, Err(ImageError::InvalidChannelShape(5, 12)));
    }

    #[test]
    fn from_fn_is_row_major() -> Result<(), ImageError> {
        let image = Image::<u8, 2>::from_fn([3, 2].into(), |x, y| [x as u8, y as u8])?;
        assert_eq!(image.as_slice(), &[0, 0, 1, 0, 2, 0, 0, 1, 1, 1, 2, 1]);
        assert_eq!(image.pixel(2, 1), &[2, 1]);
        assert_eq!(image.get([1, 2, 0]), Some(&2));
        assert_eq!(image.get([2, 0, 0]), None);
        Ok(())
    }

    #[test]
    fn cast_u8_to_f32() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([3, 1].into(), vec![0, 128, 255])?;
        let image_f32: Image<f32, 1> = image.cast()?;
        assert_eq!(image_f32.as_slice(), &[0.0, 128.0, 255.0]);

        let back: Image<u8, 1> = image_f32.cast()?;
        assert_eq!(back, image);

        let negative = Image::<f32, 1>::new([1, 1].into(), vec![-1.0])?;
        assert_eq!(negative.cast::<u8>(), Err(ImageError::CastError));
        Ok(())
    }

    #[test]
    fn channels_are_deinterleaved() -> Result<(), ImageError> {
        let image = Image::<f32, 3>::new([1, 2].into(), vec![0., 1., 2., 3., 4., 5.])?;
        let channels = image.split_channels()?;
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].as_slice(), &[0.0, 3.0]);
        assert_eq!(channels[1].as_slice(), &[1.0, 4.0]);
        assert_eq!(channels[2].as_slice(), &[2.0, 5.0]);
        assert!(matches!(
            image.channel(3),
            Err(ImageError::ChannelIndexOutOfBounds(3, 3))
        ));
        Ok(())
    }
}
