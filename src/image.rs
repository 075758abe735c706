// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};
use core::fmt;

/// Alignment and size granularity of pixel storage, one AVX2 register.
pub const BUFFER_ALIGN: usize = 32;

/// Supported 8 bit per channel pixel layouts.
///
/// [`PixelFormat::Bgra32`] is the canonical format: decoding always produces
/// it and the analysis kernels only accept it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 24-bit red, green, blue
    Rgb24,
    /// 24-bit blue, green, red
    Bgr24,
    /// 32-bit blue, green, red with an unused fourth byte
    Bgrx32,
    /// 32-bit blue, green, red, alpha
    Bgra32,
}

impl PixelFormat {
    pub const CANONICAL: PixelFormat = PixelFormat::Bgra32;

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Bgrx32 | PixelFormat::Bgra32 => 4,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Bgra32)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Bgr24 => "BGR24",
            PixelFormat::Bgrx32 => "BGRX32",
            PixelFormat::Bgra32 => "BGRA32",
        };
        f.write_str(name)
    }
}

const fn row_stride(format: PixelFormat, width: u32) -> usize {
    format.bytes_per_pixel() * width as usize
}

fn image_size(width: u32, height: u32, format: PixelFormat) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    row_stride(format, width)
        .checked_mul(height as usize)
        .ok_or(Error::InvalidDimensions { width, height })
}

#[derive(Copy, Clone)]
#[repr(C, align(32))]
struct Block([u8; BUFFER_ALIGN]);

// SAFETY: Block is a plain byte array with no padding and no invalid bit
// patterns; its alignment equals its size.
unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

/// Owned, 32-byte aligned pixel storage.
///
/// Storage is rounded up to a multiple of [`BUFFER_ALIGN`] bytes and the
/// bytes past the last pixel are initialised to known values: opaque black
/// (`00 00 00 FF`) per pixel for formats with alpha, zero otherwise. Kernels
/// therefore process whole SIMD registers without tail handling for the
/// padding.
///
/// # Example
///
/// ```
/// use trailcam_native::image::{PixelBuffer, PixelFormat};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = PixelBuffer::new(5, 3, PixelFormat::Bgra32)?;
/// assert_eq!(img.stride(), 20);
/// assert_eq!(img.size(), 60);
/// assert_eq!(img.as_bytes().len(), 64);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PixelBuffer {
    blocks: Vec<Block>,
    width: u32,
    height: u32,
    format: PixelFormat,
    decode_error: bool,
}

impl PixelBuffer {
    /// Allocates a buffer with all pixels zeroed (opaque black for alpha
    /// formats) and padding initialised.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if either dimension is zero or
    /// the pixel area does not fit in memory.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let size = image_size(width, height, format)?;
        let blocks = size.div_ceil(BUFFER_ALIGN);
        let mut img = Self {
            blocks: vec![Block([0; BUFFER_ALIGN]); blocks],
            width,
            height,
            format,
            decode_error: false,
        };
        if format.has_alpha() {
            for pixel in img.as_bytes_mut().chunks_exact_mut(4) {
                pixel[3] = 0xff;
            }
        }
        Ok(img)
    }

    /// Copies pixels from caller memory laid out with [`PixelBuffer::stride`].
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: &[u8],
    ) -> Result<Self> {
        let mut img = Self::new(width, height, format)?;
        if pixels.len() != img.size() {
            return Err(Error::InvalidParameter(format!(
                "{} pixel bytes supplied for a {} byte {}",
                pixels.len(),
                img.size(),
                img
            )));
        }
        img.pixels_mut().copy_from_slice(pixels);
        Ok(img)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    pub fn stride(&self) -> usize {
        row_stride(self.format, self.width)
    }

    pub fn total_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes in the logical pixel area, excluding padding.
    pub fn size(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// True if the last decode into this buffer hit corrupt or truncated
    /// entropy-coded data. The pixels hold whatever could be decoded.
    pub fn decode_error(&self) -> bool {
        self.decode_error
    }

    pub(crate) fn set_decode_error(&mut self, decode_error: bool) {
        self.decode_error = decode_error;
    }

    /// Whole allocation, padding included.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.blocks)
    }

    /// Logical pixel area.
    pub fn pixels(&self) -> &[u8] {
        let size = self.size();
        &self.as_bytes()[..size]
    }

    /// Logical pixel area. Padding is not reachable so it keeps its
    /// initialised values.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        let size = self.size();
        &mut self.as_bytes_mut()[..size]
    }

    /// Bytes of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let offset = self.pixel_offset(x, y)?;
        self.pixels().get(offset..offset + self.bytes_per_pixel())
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let offset = self.pixel_offset(x, y)?;
        let bpp = self.bytes_per_pixel();
        self.pixels_mut().get_mut(offset..offset + bpp)
    }

    fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride() + x as usize * self.bytes_per_pixel())
    }

    /// Copies the logical pixel area into caller memory of the same stride,
    /// the hand-off used by display surfaces.
    pub fn copy_pixels_to(&self, destination: &mut [u8]) -> Result<()> {
        let size = self.size();
        let available = destination.len();
        let destination = destination.get_mut(..size).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "destination holds {} bytes but {} needs {}",
                available, self, size
            ))
        })?;
        destination.copy_from_slice(self.pixels());
        Ok(())
    }

    pub fn same_shape(&self, other: &PixelBuffer) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// Rejects buffers the analysis kernels cannot process.
    pub fn require_canonical(&self) -> Result<()> {
        if self.format != PixelFormat::CANONICAL {
            return Err(Error::UnsupportedFormat {
                format: self.format,
                bytes_per_pixel: self.bytes_per_pixel(),
            });
        }
        Ok(())
    }

    /// Rejects `other` unless it matches this buffer in size and format.
    pub fn require_same_shape(&self, other: &PixelBuffer) -> Result<()> {
        if !self.same_shape(other) {
            return Err(Error::Mismatched {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("decode_error", &self.decode_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() -> Result<()> {
        let img = PixelBuffer::new(1920, 1080, PixelFormat::Bgra32)?;
        assert_eq!(img.size(), 8294400);
        assert_eq!(img.as_bytes().len(), 8294400);

        let img = PixelBuffer::new(1920, 1080, PixelFormat::Rgb24)?;
        assert_eq!(img.size(), 6220800);
        assert_eq!(img.stride(), 5760);

        // 3 * 3 * 3 = 27 rounds up to one block
        let img = PixelBuffer::new(3, 3, PixelFormat::Bgr24)?;
        assert_eq!(img.size(), 27);
        assert_eq!(img.as_bytes().len(), 32);
        Ok(())
    }

    #[test]
    fn test_alignment() -> Result<()> {
        for width in [1, 7, 33, 640] {
            let img = PixelBuffer::new(width, 3, PixelFormat::Bgra32)?;
            assert_eq!(img.as_bytes().as_ptr() as usize % BUFFER_ALIGN, 0);
            assert_eq!(img.as_bytes().len() % BUFFER_ALIGN, 0);
        }
        Ok(())
    }

    #[test]
    fn test_padding() -> Result<()> {
        let img = PixelBuffer::new(3, 1, PixelFormat::Bgra32)?;
        for pixel in img.as_bytes().chunks_exact(4) {
            assert_eq!(pixel, &[0, 0, 0, 0xff]);
        }

        let img = PixelBuffer::new(3, 1, PixelFormat::Bgrx32)?;
        assert!(img.as_bytes().iter().all(|b| *b == 0));

        let mut img = PixelBuffer::new(5, 1, PixelFormat::Bgr24)?;
        img.pixels_mut().fill(0x7f);
        assert!(img.as_bytes()[15..].iter().all(|b| *b == 0));
        Ok(())
    }

    #[test]
    fn test_zero_dimensions() {
        assert!(matches!(
            PixelBuffer::new(0, 10, PixelFormat::Bgra32),
            Err(Error::InvalidDimensions { .. })
        ));
        assert!(matches!(
            PixelBuffer::new(10, 0, PixelFormat::Rgb24),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_pixel_access() -> Result<()> {
        let mut img = PixelBuffer::new(4, 2, PixelFormat::Bgra32)?;
        img.pixel_mut(3, 1).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(img.pixel(3, 1), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(&img.pixels()[28..32], &[1, 2, 3, 4]);
        assert!(img.pixel(4, 0).is_none());
        assert!(img.pixel(0, 2).is_none());
        Ok(())
    }

    #[test]
    fn test_copy_in_and_out() -> Result<()> {
        let source: Vec<u8> = (0..36).collect();
        let img = PixelBuffer::from_pixels(4, 3, PixelFormat::Rgb24, &source)?;
        assert_eq!(img.pixels(), &source[..]);

        let mut display = vec![0u8; 40];
        img.copy_pixels_to(&mut display)?;
        assert_eq!(&display[..36], &source[..]);
        assert_eq!(&display[36..], &[0, 0, 0, 0]);

        let mut short = vec![0u8; 35];
        assert!(img.copy_pixels_to(&mut short).is_err());
        assert!(PixelBuffer::from_pixels(4, 3, PixelFormat::Rgb24, &source[1..]).is_err());
        Ok(())
    }

    #[test]
    fn test_shape_checks() -> Result<()> {
        let a = PixelBuffer::new(4, 4, PixelFormat::Bgra32)?;
        let b = PixelBuffer::new(4, 4, PixelFormat::Bgra32)?;
        let c = PixelBuffer::new(4, 5, PixelFormat::Bgra32)?;
        let d = PixelBuffer::new(4, 4, PixelFormat::Bgr24)?;
        assert!(a.require_same_shape(&b).is_ok());
        assert!(matches!(a.require_same_shape(&c), Err(Error::Mismatched { .. })));
        assert!(a.require_canonical().is_ok());
        assert!(matches!(
            d.require_canonical(),
            Err(Error::UnsupportedFormat { bytes_per_pixel: 3, .. })
        ));
        assert_eq!(a.to_string(), "4x4 BGRA32");
        Ok(())
    }
}
