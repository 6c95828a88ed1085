/// Errors raised by image construction and conversion.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// The buffer length does not match `width * height * channels`.
    #[error("buffer holds {0} values, expected {1}")]
    InvalidChannelShape(usize, usize),

    /// Two images that must have the same size do not.
    #[error("image size mismatch: {0}x{1} vs {2}x{3}")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Width or height is zero.
    #[error("image has a zero dimension: {0}x{1}")]
    EmptyImage(usize, usize),

    /// A channel index past the channel count.
    #[error("channel {0} out of range for {1} channels")]
    ChannelIndexOutOfBounds(usize, usize),

    /// A value does not fit the target component type.
    #[error("pixel value cannot be represented in the target type")]
    CastError,

    /// No pixel format has this many channels.
    #[error("unsupported number of channels: {0}")]
    UnsupportedChannels(usize),
}
