//! Decoded frame samples.

use image::RgbImage;

/// One decoded frame, tagged with its zero-based position in the stream.
///
/// Pixels are always 8-bit RGB at the frame's native resolution, so two
/// samples from different parts of a variable-resolution stream can be
/// told apart by their dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    index: u64,
    image: RgbImage,
}

impl FrameSample {
    /// Wrap a decoded image.
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Zero-based frame index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// The decoded pixels.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Tightly-packed RGB bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Take ownership of the decoded pixels.
    pub fn into_image(self) -> RgbImage {
        self.image
    }
}
