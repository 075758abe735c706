// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! JPEG decoding into canonical [`PixelBuffer`]s.
//!
//! Decoding always produces [`PixelFormat::Bgra32`], whatever the source
//! chroma subsampling. When a target width is requested libjpeg-turbo's DCT
//! scaling picks the coarsest ratio that still covers it, which is far
//! cheaper than decoding full size and resizing.

use crate::{
    error::{Error, Result},
    image::{PixelBuffer, PixelFormat},
};
use tracing::{debug, warn};
use turbojpeg::{Decompressor, ScalingFactor};

/// DCT scaling ratio applied while decoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Downscale {
    pub num: usize,
    pub denom: usize,
}

impl Downscale {
    pub const FULL: Downscale = Downscale { num: 1, denom: 1 };
    pub const HALF: Downscale = Downscale { num: 1, denom: 2 };
    pub const THREE_EIGHTHS: Downscale = Downscale { num: 3, denom: 8 };
    pub const QUARTER: Downscale = Downscale { num: 1, denom: 4 };
    pub const EIGHTH: Downscale = Downscale { num: 1, denom: 8 };

    /// Picks the coarsest ratio whose output is still at least
    /// `requested_width` wide. No request decodes at full size.
    ///
    /// # Errors
    ///
    /// A requested width of zero is rejected.
    pub fn for_width(native_width: usize, requested_width: Option<u32>) -> Result<Self> {
        let requested = match requested_width {
            None => return Ok(Downscale::FULL),
            Some(0) => {
                return Err(Error::InvalidParameter(
                    "requested decode width must be positive".to_owned(),
                ))
            }
            Some(width) => width as usize,
        };

        let scale = match native_width / requested {
            ratio if ratio >= 8 => Downscale::EIGHTH,
            ratio if ratio >= 4 => Downscale::QUARTER,
            ratio if ratio >= 3 => Downscale::THREE_EIGHTHS,
            ratio if ratio >= 2 => Downscale::HALF,
            _ => Downscale::FULL,
        };
        Ok(scale)
    }

    /// Scaled size of one dimension, rounded up as libjpeg-turbo does.
    pub fn apply(&self, dimension: usize) -> usize {
        (dimension * self.num).div_ceil(self.denom)
    }
}

impl From<Downscale> for ScalingFactor {
    fn from(scale: Downscale) -> Self {
        ScalingFactor::new(scale.num, scale.denom)
    }
}

struct ScaledHeader {
    width: u32,
    height: u32,
    scale: Downscale,
}

fn read_header(
    decompressor: &mut Decompressor,
    jpeg: &[u8],
    requested_width: Option<u32>,
) -> Result<ScaledHeader> {
    let header = decompressor.read_header(jpeg)?;
    let scale = Downscale::for_width(header.width, requested_width)?;
    let width = scale.apply(header.width);
    let height = scale.apply(header.height);
    let dims = |w: usize, h: usize| Error::InvalidDimensions {
        width: w.min(u32::MAX as usize) as u32,
        height: h.min(u32::MAX as usize) as u32,
    };
    let width = u32::try_from(width).map_err(|_| dims(width, height))?;
    let height = u32::try_from(height).map_err(|_| dims(width as usize, height))?;

    decompressor.set_scaling_factor(scale.into())?;
    debug!(
        "jpeg {}x{} scaled {}/{} to {}x{}",
        header.width, header.height, scale.num, scale.denom, width, height
    );
    Ok(ScaledHeader {
        width,
        height,
        scale,
    })
}

fn decompress_into(decompressor: &mut Decompressor, jpeg: &[u8], img: &mut PixelBuffer) {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let pitch = img.stride();
    let output = turbojpeg::Image {
        pixels: img.pixels_mut(),
        width,
        pitch,
        height,
        format: turbojpeg::PixelFormat::BGRA,
    };

    // the usual cause is a file truncated by a camera powering off mid-write;
    // whatever was decoded is kept and flagged
    let decode_error = match decompressor.decompress(jpeg, output) {
        Ok(()) => false,
        Err(err) => {
            warn!("jpeg data error decoding {}: {}", img, err);
            true
        }
    };
    img.set_decode_error(decode_error);
}

fn byte_range(bytes: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    offset
        .checked_add(length)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(Error::InvalidRange {
            offset,
            length,
            available: bytes.len(),
        })
}

impl PixelBuffer {
    /// Decodes a JPEG into a new canonical buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the header cannot be parsed. Corrupt data
    /// after a valid header is not an error; see
    /// [`PixelBuffer::decode_error`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use trailcam_native::image::PixelBuffer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let jpeg = std::fs::read("IMG_0001.JPG")?;
    /// let thumbnail = PixelBuffer::decode(&jpeg, Some(256))?;
    /// println!("decoded {}", thumbnail);
    /// # Ok(())
    /// # }
    /// ```
    pub fn decode(jpeg: &[u8], requested_width: Option<u32>) -> Result<Self> {
        let mut decompressor = Decompressor::new()?;
        let header = read_header(&mut decompressor, jpeg, requested_width)?;
        let mut img = PixelBuffer::new(header.width, header.height, PixelFormat::CANONICAL)?;
        decompress_into(&mut decompressor, jpeg, &mut img);
        Ok(img)
    }

    /// Decodes `length` bytes starting at `offset` within `bytes`.
    pub fn decode_range(
        bytes: &[u8],
        offset: usize,
        length: usize,
        requested_width: Option<u32>,
    ) -> Result<Self> {
        PixelBuffer::decode(byte_range(bytes, offset, length)?, requested_width)
    }

    /// Decodes into this buffer, reusing its allocation.
    ///
    /// Returns `Ok(false)` without touching the buffer when the decoded
    /// dimensions or the format don't match it; the caller can fall back to
    /// [`PixelBuffer::decode`].
    pub fn try_decode(&mut self, jpeg: &[u8], requested_width: Option<u32>) -> Result<bool> {
        let mut decompressor = Decompressor::new()?;
        let header = read_header(&mut decompressor, jpeg, requested_width)?;
        if header.width != self.width()
            || header.height != self.height()
            || self.format() != PixelFormat::CANONICAL
        {
            debug!(
                "cannot reuse {} for {}x{} decode at {}/{}",
                self, header.width, header.height, header.scale.num, header.scale.denom
            );
            return Ok(false);
        }
        decompress_into(&mut decompressor, jpeg, self);
        Ok(true)
    }

    /// Range variant of [`PixelBuffer::try_decode`].
    pub fn try_decode_range(
        &mut self,
        bytes: &[u8],
        offset: usize,
        length: usize,
        requested_width: Option<u32>,
    ) -> Result<bool> {
        self.try_decode(byte_range(bytes, offset, length)?, requested_width)
    }
}
