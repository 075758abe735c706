// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Analysis kernels over canonical BGRA pixel bytes.
//!
//! Each operation exists in up to four tiers with one signature. The scalar
//! tier is the reference; SIMD tiers hand partial-register tails back to it.
//! The functions here select the tier body and are `unsafe` because the
//! caller vouches that the processor runs the requested tier, which
//! [`crate::dispatch::Dispatcher`] does.

use crate::dispatch::Tier;

#[cfg(target_arch = "x86_64")]
mod avx2;
pub(crate) mod scalar;
#[cfg(target_arch = "x86_64")]
mod sse41;

pub const PIXEL_BYTES: usize = 4;

/// Bytes processed per difference block.
pub const DIFFERENCE_BLOCK_BYTES: usize = 16 * 1024;
/// Bytes processed per combined difference block, smaller since three
/// inputs and one output share the cache.
pub const COMBINED_DIFFERENCE_BLOCK_BYTES: usize = 12 * 1024;

/// A pixel is greyscale when `|R-G| + |G-B| + |B-R|` is at most this.
pub const GREYSCALE_PIXEL_THRESHOLD: i32 = 40;
/// Scalar IsDark checks every nth pixel.
pub const DARK_PIXEL_STRIDE_SCALAR: usize = 10;
/// SIMD IsDark checks this many consecutive pixels out of every
/// [`DARK_PIXEL_GROUP_STRIDE_SIMD`], one 32 byte half cache line.
pub const DARK_PIXEL_GROUP_SIMD: usize = 8;
pub const DARK_PIXEL_GROUP_STRIDE_SIMD: usize = 16;

/// Luminosity weights, scaled so they sum to [`LUMINOSITY_SCALE`].
pub const LUMINOSITY_BLUE: i32 = 14;
pub const LUMINOSITY_GREEN: i32 = 74;
pub const LUMINOSITY_RED: i32 = 37;
pub const LUMINOSITY_SCALE: i32 = 125;

pub(crate) const COLOR_MASK: u32 = 0x00ff_ffff;
pub(crate) const OPAQUE_BLACK: u32 = 0xff00_0000;

/// Sampled pixel counts from IsDark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DarkCounts {
    pub dark: usize,
    pub greyscale: usize,
    pub sampled: usize,
}

impl std::ops::AddAssign for DarkCounts {
    fn add_assign(&mut self, other: Self) {
        self.dark += other.dark;
        self.greyscale += other.greyscale;
        self.sampled += other.sampled;
    }
}

/// Unnormalized sums from GetLuminosityAndColoration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LuminosityTotals {
    /// Sum of `37R + 74G + 14B`.
    pub luminosity: u64,
    /// Sum of `|R-G| + |G-B| + |B-R|`.
    pub coloration: u64,
    pub pixels: usize,
}

impl std::ops::AddAssign for LuminosityTotals {
    fn add_assign(&mut self, other: Self) {
        self.luminosity += other.luminosity;
        self.coloration += other.coloration;
        self.pixels += other.pixels;
    }
}

#[inline(always)]
pub(crate) fn luminosity(b: i32, g: i32, r: i32) -> i32 {
    LUMINOSITY_RED * r + LUMINOSITY_GREEN * g + LUMINOSITY_BLUE * b
}

#[inline(always)]
pub(crate) fn coloration(b: i32, g: i32, r: i32) -> i32 {
    (r - g).abs() + (g - b).abs() + (b - r).abs()
}

#[inline(always)]
pub(crate) fn is_dark_pixel(luminosity: i32, dark_pixel_threshold: u8) -> bool {
    luminosity <= LUMINOSITY_SCALE * dark_pixel_threshold as i32
}

/// # Safety
///
/// The processor must support `tier`.
pub(crate) unsafe fn difference(
    tier: Tier,
    current: &[u8],
    other: &[u8],
    threshold: u8,
    out: &mut [u8],
) {
    match tier {
        Tier::Scalar => scalar::difference(current, other, threshold, out),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41 => sse41::difference(current, other, threshold, out),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41Vex => sse41::vex::difference(current, other, threshold, out),
        #[cfg(target_arch = "x86_64")]
        Tier::Avx2 => avx2::difference(current, other, threshold, out),
        #[cfg(not(target_arch = "x86_64"))]
        _ => scalar::difference(current, other, threshold, out),
    }
}

/// # Safety
///
/// The processor must support `tier`.
pub(crate) unsafe fn combined_difference(
    tier: Tier,
    previous: &[u8],
    current: &[u8],
    next: &[u8],
    threshold: u8,
    out: &mut [u8],
) {
    match tier {
        Tier::Scalar => scalar::combined_difference(previous, current, next, threshold, out),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41 => sse41::combined_difference(previous, current, next, threshold, out),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41Vex => {
            sse41::vex::combined_difference(previous, current, next, threshold, out)
        }
        #[cfg(target_arch = "x86_64")]
        Tier::Avx2 => avx2::combined_difference(previous, current, next, threshold, out),
        #[cfg(not(target_arch = "x86_64"))]
        _ => scalar::combined_difference(previous, current, next, threshold, out),
    }
}

/// # Safety
///
/// The processor must support `tier`.
pub(crate) unsafe fn is_black(tier: Tier, pixels: &[u8]) -> bool {
    match tier {
        Tier::Scalar => scalar::is_black(pixels),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41 => sse41::is_black(pixels),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41Vex => sse41::vex::is_black(pixels),
        #[cfg(target_arch = "x86_64")]
        Tier::Avx2 => avx2::is_black(pixels),
        #[cfg(not(target_arch = "x86_64"))]
        _ => scalar::is_black(pixels),
    }
}

/// # Safety
///
/// The processor must support `tier`.
pub(crate) unsafe fn dark_counts(
    tier: Tier,
    pixels: &[u8],
    dark_pixel_threshold: u8,
) -> DarkCounts {
    match tier {
        Tier::Scalar => scalar::dark_counts(pixels, dark_pixel_threshold),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41 => sse41::dark_counts(pixels, dark_pixel_threshold),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41Vex => sse41::vex::dark_counts(pixels, dark_pixel_threshold),
        #[cfg(target_arch = "x86_64")]
        Tier::Avx2 => avx2::dark_counts(pixels, dark_pixel_threshold),
        #[cfg(not(target_arch = "x86_64"))]
        _ => scalar::dark_counts(pixels, dark_pixel_threshold),
    }
}

/// # Safety
///
/// The processor must support `tier`.
pub(crate) unsafe fn luminosity_totals(tier: Tier, pixels: &[u8]) -> LuminosityTotals {
    match tier {
        Tier::Scalar => scalar::luminosity_totals(pixels),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41 => sse41::luminosity_totals(pixels),
        #[cfg(target_arch = "x86_64")]
        Tier::Sse41Vex => sse41::vex::luminosity_totals(pixels),
        #[cfg(target_arch = "x86_64")]
        Tier::Avx2 => avx2::luminosity_totals(pixels),
        #[cfg(not(target_arch = "x86_64"))]
        _ => scalar::luminosity_totals(pixels),
    }
}

/// Reference for the SIMD IsDark sampling pattern.
#[cfg(test)]
pub(crate) fn simd_dark_counts_reference(pixels: &[u8], dark_pixel_threshold: u8) -> DarkCounts {
    let mut counts = DarkCounts::default();
    let group_bytes = DARK_PIXEL_GROUP_SIMD * PIXEL_BYTES;
    for group in pixels.chunks(DARK_PIXEL_GROUP_STRIDE_SIMD * PIXEL_BYTES) {
        let sampled = &group[..group.len().min(group_bytes)];
        counts += scalar::dark_counts_dense(sampled, dark_pixel_threshold);
    }
    counts
}

#[cfg(test)]
pub(crate) mod test_pixels {
    /// Deterministic noise with some dark, greyscale and saturated pixels.
    pub fn noise(pixels: usize, seed: u32) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        let mut bytes = Vec::with_capacity(pixels * 4);
        for i in 0..pixels {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [b, g, r, _] = state.to_le_bytes();
            let pixel = match i % 7 {
                0 => [b / 8, g / 8, r / 8, 0xff],
                1 => [b, b, b.saturating_add(10), 0xff],
                _ => [b, g, r, 0xff],
            };
            bytes.extend_from_slice(&pixel);
        }
        bytes
    }
}
