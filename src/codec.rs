//! Image decoding boundary.
//!
//! The engine never parses image formats itself. It hands raw bytes to an
//! [`ImageCodec`] and passes the resulting [`DecodedImage`] to the
//! presenter. [`StandardCodec`] covers PNG, JPEG, GIF, WebP and BMP through
//! the `image` crate.

use std::fmt;

use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::debug;

/// Default cap on decoded pixels (64 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Errors returned by an [`ImageCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes are not in any supported image format.
    #[error("unrecognized image format")]
    UnknownFormat,

    /// The format was recognized but the data is malformed.
    #[error("malformed {format} image: {message}")]
    Malformed {
        /// Detected format name.
        format: String,
        /// Decoder message.
        message: String,
    },

    /// The image exceeds the configured pixel budget.
    #[error("image of {width}x{height} exceeds the {max_pixels} pixel limit")]
    TooLarge {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
        /// Configured limit.
        max_pixels: u64,
    },
}

/// A decoded, display-ready RGBA image.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl DecodedImage {
    /// Wraps already-decoded pixels.
    #[must_use]
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Borrows the RGBA pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Decodes raw payload bytes into a [`DecodedImage`].
pub trait ImageCodec: Send + Sync {
    /// Decodes `bytes`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the payload is not a valid image.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;
}

/// Codec backed by the `image` crate with a pixel budget.
#[derive(Debug, Clone)]
pub struct StandardCodec {
    max_pixels: u64,
}

impl Default for StandardCodec {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl StandardCodec {
    /// Creates a codec that rejects images with more than `max_pixels` pixels.
    #[must_use]
    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    fn enforce_limits(&self, image: &DynamicImage) -> Result<(), CodecError> {
        let (width, height) = image.dimensions();
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(CodecError::TooLarge {
                width,
                height,
                max_pixels: self.max_pixels,
            });
        }
        Ok(())
    }
}

impl ImageCodec for StandardCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let format = image::guess_format(bytes).map_err(|_| CodecError::UnknownFormat)?;
        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            CodecError::Malformed {
                format: format_name(format),
                message: e.to_string(),
            }
        })?;
        self.enforce_limits(&image)?;
        debug!(
            format = %format_name(format),
            width = image.width(),
            height = image.height(),
            "decoded image"
        );
        Ok(DecodedImage::from_rgba(image.into_rgba8()))
    }
}

fn format_name(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map_or_else(|| format!("{format:?}"), |ext| (*ext).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, Rgba};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let decoded = StandardCodec::default().decode(&png_bytes(3, 2)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(decoded.pixels().get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_rejects_non_image() {
        let err = StandardCodec::default()
            .decode(b"<html>not an image</html>")
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownFormat));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let bytes = png_bytes(4, 4);
        let err = StandardCodec::default().decode(&bytes[..20]).unwrap_err();
        assert!(
            matches!(err, CodecError::Malformed { .. }),
            "Expected Malformed, got: {err:?}"
        );
    }

    #[test]
    fn test_decode_enforces_pixel_limit() {
        let err = StandardCodec::with_max_pixels(10)
            .decode(&png_bytes(4, 4))
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::TooLarge {
                width: 4,
                height: 4,
                ..
            }
        ));
    }
}
