// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Tier selection and invocation of the analysis kernels.
//!
//! A [`Dispatcher`] resolves each [`Operation`] to the fastest tier the
//! capability snapshot allows, validates the inputs and splits difference
//! work into cache sized blocks.

use crate::{
    cpu::Capabilities,
    error::{Error, Result},
    image::{PixelBuffer, PixelFormat},
    kernels::{self, COMBINED_DIFFERENCE_BLOCK_BYTES, DIFFERENCE_BLOCK_BYTES},
    policy,
    properties::{Darkness, ImageProperties},
};
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, trace};

/// Scalar images with more pixels than this are split across the block
/// pool.
pub const MIN_PARALLEL_PIXELS: usize = 256 * 1024;

/// Interchangeable kernel implementations, slowest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Scalar,
    Sse41,
    /// SSE4.1 kernels emitted with VEX encoding.
    Sse41Vex,
    Avx2,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Scalar, Tier::Sse41, Tier::Sse41Vex, Tier::Avx2];

    pub fn is_supported(self, caps: &Capabilities) -> bool {
        match self {
            Tier::Scalar => true,
            Tier::Sse41 => caps.sse41(),
            Tier::Sse41Vex => caps.sse41() && caps.avx(),
            Tier::Avx2 => caps.sse41() && caps.avx2(),
        }
    }

    /// Every tier `caps` can run.
    pub fn supported(caps: &Capabilities) -> impl Iterator<Item = Tier> + '_ {
        Tier::ALL.into_iter().filter(|tier| tier.is_supported(caps))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Tier::Scalar => write!(f, "scalar"),
            Tier::Sse41 => write!(f, "SSE4.1"),
            Tier::Sse41Vex => write!(f, "VEX SSE4.1"),
            Tier::Avx2 => write!(f, "AVX2"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Difference,
    CombinedDifference,
    IsBlack,
    IsDark,
    LuminosityAndColoration,
}

impl Operation {
    /// Memory bound sampling loops run faster on average with VEX encoded
    /// SSE4.1 than with AVX2.
    fn prefers_avx2(self) -> bool {
        !matches!(self, Operation::IsDark | Operation::LuminosityAndColoration)
    }
}

/// Selects and runs kernels for one capability snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    caps: &'a Capabilities,
    forced: Option<Tier>,
}

impl Dispatcher<'static> {
    /// Dispatcher for the process-wide capability snapshot.
    pub fn new() -> Self {
        Dispatcher::with_capabilities(Capabilities::get())
    }
}

impl Default for Dispatcher<'static> {
    fn default() -> Self {
        Dispatcher::new()
    }
}

impl<'a> Dispatcher<'a> {
    pub fn with_capabilities(caps: &'a Capabilities) -> Self {
        Dispatcher { caps, forced: None }
    }

    /// Runs every operation on `tier` instead of the automatic choice.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedTier`] if the capability snapshot lacks `tier`.
    pub fn with_tier(self, tier: Tier) -> Result<Self> {
        if !tier.is_supported(self.caps) {
            return Err(Error::UnsupportedTier(tier));
        }
        debug!("forcing {} kernels", tier);
        Ok(Dispatcher {
            caps: self.caps,
            forced: Some(tier),
        })
    }

    pub fn capabilities(&self) -> &'a Capabilities {
        self.caps
    }

    /// The tier `operation` runs on.
    pub fn tier(&self, operation: Operation) -> Tier {
        if let Some(tier) = self.forced {
            return tier;
        }
        let caps = self.caps;
        if operation.prefers_avx2() && Tier::Avx2.is_supported(caps) {
            Tier::Avx2
        } else if Tier::Sse41Vex.is_supported(caps) {
            Tier::Sse41Vex
        } else if Tier::Sse41.is_supported(caps) {
            Tier::Sse41
        } else {
            Tier::Scalar
        }
    }

    /// Motion map between two frames. Pixels whose summed channel
    /// difference exceeds `3 * threshold` become grey at a third of that
    /// sum, everything else opaque black.
    ///
    /// # Errors
    ///
    /// Both images must be [`PixelFormat::Bgra32`] and the same size.
    pub fn difference(
        &self,
        current: &PixelBuffer,
        other: &PixelBuffer,
        threshold: u8,
    ) -> Result<PixelBuffer> {
        current.require_canonical()?;
        current.require_same_shape(other)?;

        let tier = self.tier(Operation::Difference);
        trace!("difference {} on {}", current, tier);
        let mut out = PixelBuffer::new(current.width(), current.height(), PixelFormat::CANONICAL)?;
        let (current, other) = (current.as_bytes(), other.as_bytes());
        let pixels = out.total_pixels();
        self.run_blocks(
            tier,
            pixels,
            out.as_bytes_mut(),
            DIFFERENCE_BLOCK_BYTES,
            |offset, block| {
                let range = offset..offset + block.len();
                // SAFETY: tier() only yields tiers the capability snapshot supports.
                unsafe {
                    kernels::difference(
                        tier,
                        &current[range.clone()],
                        &other[range],
                        threshold,
                        block,
                    )
                }
            },
        )?;
        Ok(out)
    }

    /// Motion map against both neighbours. A pixel is marked only when it
    /// differs from the previous and the next frame, at a sixth of the two
    /// sums.
    pub fn combined_difference(
        &self,
        previous: &PixelBuffer,
        current: &PixelBuffer,
        next: &PixelBuffer,
        threshold: u8,
    ) -> Result<PixelBuffer> {
        current.require_canonical()?;
        current.require_same_shape(previous)?;
        current.require_same_shape(next)?;

        let tier = self.tier(Operation::CombinedDifference);
        trace!("combined difference {} on {}", current, tier);
        let mut out = PixelBuffer::new(current.width(), current.height(), PixelFormat::CANONICAL)?;
        let (previous, current, next) = (previous.as_bytes(), current.as_bytes(), next.as_bytes());
        let pixels = out.total_pixels();
        self.run_blocks(
            tier,
            pixels,
            out.as_bytes_mut(),
            COMBINED_DIFFERENCE_BLOCK_BYTES,
            |offset, block| {
                let range = offset..offset + block.len();
                // SAFETY: tier() only yields tiers the capability snapshot supports.
                unsafe {
                    kernels::combined_difference(
                        tier,
                        &previous[range.clone()],
                        &current[range.clone()],
                        &next[range],
                        threshold,
                        block,
                    )
                }
            },
        )?;
        Ok(out)
    }

    /// True if no pixel has a non-zero blue, green or red channel.
    pub fn is_black(&self, img: &PixelBuffer) -> Result<bool> {
        img.require_canonical()?;
        let tier = self.tier(Operation::IsBlack);
        // padding is opaque black and cannot change the answer
        // SAFETY: tier() only yields tiers the capability snapshot supports.
        Ok(unsafe { kernels::is_black(tier, img.as_bytes()) })
    }

    /// Samples the image for dark and greyscale pixels.
    ///
    /// A pixel is dark when its weighted luminosity is at most
    /// `dark_pixel_threshold`; a greyscale image is dark when at least
    /// `dark_pixel_ratio` of the sampled pixels are. Color images are never
    /// dark, see [`Darkness`].
    ///
    /// # Errors
    ///
    /// [`Error::RatioOutOfRange`] unless `dark_pixel_ratio` is in `[0, 1]`.
    pub fn is_dark(
        &self,
        img: &PixelBuffer,
        dark_pixel_threshold: u8,
        dark_pixel_ratio: f64,
    ) -> Result<Darkness> {
        if !(0.0..=1.0).contains(&dark_pixel_ratio) {
            return Err(Error::RatioOutOfRange(dark_pixel_ratio));
        }
        img.require_canonical()?;

        let tier = self.tier(Operation::IsDark);
        // SAFETY: tier() only yields tiers the capability snapshot supports.
        let counts = unsafe { kernels::dark_counts(tier, img.pixels(), dark_pixel_threshold) };
        trace!("{} dark sample on {}: {:?}", img, tier, counts);
        Ok(Darkness::from_counts(counts, dark_pixel_ratio))
    }

    /// Mean luminosity and coloration, ignoring `bottom_rows_to_skip` rows
    /// at the bottom where cameras stamp their info bar.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if no rows would remain.
    pub fn luminosity_and_coloration(
        &self,
        img: &PixelBuffer,
        bottom_rows_to_skip: u32,
    ) -> Result<ImageProperties> {
        img.require_canonical()?;
        if bottom_rows_to_skip >= img.height() {
            return Err(Error::InvalidParameter(format!(
                "cannot skip {} rows of a {} row image",
                bottom_rows_to_skip,
                img.height()
            )));
        }

        let tier = self.tier(Operation::LuminosityAndColoration);
        let rows = (img.height() - bottom_rows_to_skip) as usize;
        let area = &img.pixels()[..rows * img.stride()];
        // SAFETY: tier() only yields tiers the capability snapshot supports.
        let totals = unsafe { kernels::luminosity_totals(tier, area) };
        trace!("{} luminosity on {}: {:?}", img, tier, totals);
        Ok(ImageProperties::from_totals(totals))
    }

    /// Runs `kernel` over `out` in `block_bytes` blocks, passing each
    /// block's byte offset. Large scalar jobs go to the block pool.
    fn run_blocks<F>(
        &self,
        tier: Tier,
        pixels: usize,
        out: &mut [u8],
        block_bytes: usize,
        kernel: F,
    ) -> Result<()>
    where
        F: Fn(usize, &mut [u8]) + Send + Sync,
    {
        if tier == Tier::Scalar && pixels > MIN_PARALLEL_PIXELS && policy::max_concurrency() > 1 {
            policy::thread_pool()?.install(|| {
                out.par_chunks_mut(block_bytes)
                    .enumerate()
                    .for_each(|(index, block)| kernel(index * block_bytes, block))
            });
        } else {
            for (index, block) in out.chunks_mut(block_bytes).enumerate() {
                kernel(index * block_bytes, block);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_only() {
        let caps = Capabilities::get().without_simd();
        let dispatcher = Dispatcher::with_capabilities(&caps);
        assert_eq!(dispatcher.tier(Operation::Difference), Tier::Scalar);
        assert_eq!(dispatcher.tier(Operation::IsDark), Tier::Scalar);
        assert!(matches!(
            dispatcher.with_tier(Tier::Sse41),
            Err(Error::UnsupportedTier(Tier::Sse41))
        ));
        assert_eq!(Tier::supported(&caps).collect::<Vec<_>>(), [Tier::Scalar]);
    }

    #[test]
    fn test_avx2_override() {
        let caps = Capabilities::get();
        let dispatcher = Dispatcher::with_capabilities(caps);
        assert_ne!(dispatcher.tier(Operation::IsDark), Tier::Avx2);
        assert_ne!(dispatcher.tier(Operation::LuminosityAndColoration), Tier::Avx2);
        if caps.avx2() && caps.sse41() {
            assert_eq!(dispatcher.tier(Operation::Difference), Tier::Avx2);
            assert_eq!(dispatcher.tier(Operation::IsBlack), Tier::Avx2);
            assert_eq!(dispatcher.tier(Operation::IsDark), Tier::Sse41Vex);
        }
    }

    #[test]
    fn test_forced_tier() -> Result<()> {
        let dispatcher = Dispatcher::new().with_tier(Tier::Scalar)?;
        assert_eq!(dispatcher.tier(Operation::Difference), Tier::Scalar);
        assert_eq!(dispatcher.tier(Operation::IsDark), Tier::Scalar);
        Ok(())
    }

    #[test]
    fn test_block_sizes_keep_alignment() {
        assert_eq!(DIFFERENCE_BLOCK_BYTES % crate::image::BUFFER_ALIGN, 0);
        assert_eq!(COMBINED_DIFFERENCE_BLOCK_BYTES % crate::image::BUFFER_ALIGN, 0);
    }

    #[test]
    fn test_is_dark_rejects_ratio() -> Result<()> {
        let img = PixelBuffer::new(4, 4, PixelFormat::Bgra32)?;
        let dispatcher = Dispatcher::new();
        for ratio in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                dispatcher.is_dark(&img, 60, ratio),
                Err(Error::RatioOutOfRange(_))
            ));
        }
        assert!(dispatcher.is_dark(&img, 60, 1.0)?.is_dark);
        Ok(())
    }

    #[test]
    fn test_skip_rows() -> Result<()> {
        let img = PixelBuffer::new(4, 4, PixelFormat::Bgra32)?;
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.luminosity_and_coloration(&img, 3).is_ok());
        assert!(matches!(
            dispatcher.luminosity_and_coloration(&img, 4),
            Err(Error::InvalidParameter(_))
        ));
        Ok(())
    }

    #[test]
    fn test_rejects_non_canonical() -> Result<()> {
        let img = PixelBuffer::new(4, 4, PixelFormat::Rgb24)?;
        assert!(matches!(
            Dispatcher::new().is_black(&img),
            Err(Error::UnsupportedFormat { .. })
        ));
        Ok(())
    }
}
