// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Reference kernels. Every SIMD tier must reproduce these results, and the
//! SIMD tiers call back into them for partial-register tails.

use super::{
    coloration, is_dark_pixel, luminosity, DarkCounts, LuminosityTotals, COLOR_MASK,
    DARK_PIXEL_STRIDE_SCALAR, GREYSCALE_PIXEL_THRESHOLD, OPAQUE_BLACK, PIXEL_BYTES,
};

#[inline(always)]
fn sum_of_absolute_differences(a: &[u8], b: &[u8]) -> i32 {
    (a[0] as i32 - b[0] as i32).abs()
        + (a[1] as i32 - b[1] as i32).abs()
        + (a[2] as i32 - b[2] as i32).abs()
}

#[inline(always)]
fn write_level(pixel: &mut [u8], level: u8) {
    pixel.copy_from_slice(&[level, level, level, 0xff]);
}

pub fn difference(current: &[u8], other: &[u8], threshold: u8, out: &mut [u8]) {
    debug_assert_eq!(current.len(), other.len());
    debug_assert_eq!(current.len(), out.len());

    let limit = 3 * threshold as i32;
    for ((c, o), d) in current
        .chunks_exact(PIXEL_BYTES)
        .zip(other.chunks_exact(PIXEL_BYTES))
        .zip(out.chunks_exact_mut(PIXEL_BYTES))
    {
        let sad = sum_of_absolute_differences(c, o);
        if sad > limit {
            write_level(d, (sad / 3) as u8);
        } else {
            d.copy_from_slice(&OPAQUE_BLACK.to_le_bytes());
        }
    }
}

pub fn combined_difference(
    previous: &[u8],
    current: &[u8],
    next: &[u8],
    threshold: u8,
    out: &mut [u8],
) {
    debug_assert_eq!(current.len(), previous.len());
    debug_assert_eq!(current.len(), next.len());
    debug_assert_eq!(current.len(), out.len());

    let limit = 3 * threshold as i32;
    for (((p, c), n), d) in previous
        .chunks_exact(PIXEL_BYTES)
        .zip(current.chunks_exact(PIXEL_BYTES))
        .zip(next.chunks_exact(PIXEL_BYTES))
        .zip(out.chunks_exact_mut(PIXEL_BYTES))
    {
        let sad_previous = sum_of_absolute_differences(c, p);
        let sad_next = sum_of_absolute_differences(c, n);
        if sad_previous > limit && sad_next > limit {
            write_level(d, ((sad_previous + sad_next) / 6) as u8);
        } else {
            d.copy_from_slice(&OPAQUE_BLACK.to_le_bytes());
        }
    }
}

/// Scans bottom to top, where camera info bars put non-black text.
pub fn is_black(pixels: &[u8]) -> bool {
    pixels
        .chunks_exact(PIXEL_BYTES)
        .rev()
        .all(|p| u32::from_le_bytes([p[0], p[1], p[2], p[3]]) & COLOR_MASK == 0)
}

/// Classifies every pixel of `pixels`.
pub fn dark_counts_dense(pixels: &[u8], dark_pixel_threshold: u8) -> DarkCounts {
    count(pixels.chunks_exact(PIXEL_BYTES), dark_pixel_threshold)
}

/// Classifies every [`DARK_PIXEL_STRIDE_SCALAR`]th pixel.
pub fn dark_counts(pixels: &[u8], dark_pixel_threshold: u8) -> DarkCounts {
    count(
        pixels
            .chunks_exact(PIXEL_BYTES)
            .step_by(DARK_PIXEL_STRIDE_SCALAR),
        dark_pixel_threshold,
    )
}

fn count<'a>(pixels: impl Iterator<Item = &'a [u8]>, dark_pixel_threshold: u8) -> DarkCounts {
    let mut counts = DarkCounts::default();
    for p in pixels {
        let (b, g, r) = (p[0] as i32, p[1] as i32, p[2] as i32);
        if is_dark_pixel(luminosity(b, g, r), dark_pixel_threshold) {
            counts.dark += 1;
        }
        if coloration(b, g, r) <= GREYSCALE_PIXEL_THRESHOLD {
            counts.greyscale += 1;
        }
        counts.sampled += 1;
    }
    counts
}

pub fn luminosity_totals(pixels: &[u8]) -> LuminosityTotals {
    let mut totals = LuminosityTotals::default();
    for p in pixels.chunks_exact(PIXEL_BYTES) {
        let (b, g, r) = (p[0] as i32, p[1] as i32, p[2] as i32);
        totals.luminosity += luminosity(b, g, r) as u64;
        totals.coloration += coloration(b, g, r) as u64;
        totals.pixels += 1;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgra(pixels: &[[u8; 4]]) -> Vec<u8> {
        pixels.iter().flatten().copied().collect()
    }

    #[test]
    fn test_difference_levels() {
        let current = bgra(&[[10, 10, 10, 255], [100, 50, 0, 255], [0, 0, 0, 255]]);
        let other = bgra(&[[10, 10, 10, 255], [0, 0, 0, 255], [20, 20, 20, 255]]);
        let mut out = vec![0u8; current.len()];
        difference(&current, &other, 20, &mut out);
        // sad 0, 150 and 60; 60 == 3 * 20 is not above threshold
        assert_eq!(out, bgra(&[[0, 0, 0, 255], [50, 50, 50, 255], [0, 0, 0, 255]]));
    }

    #[test]
    fn test_difference_ignores_alpha() {
        let current = bgra(&[[0, 0, 0, 0]]);
        let other = bgra(&[[0, 0, 0, 255]]);
        let mut out = vec![0u8; 4];
        difference(&current, &other, 0, &mut out);
        assert_eq!(out, [0, 0, 0, 255]);
    }

    #[test]
    fn test_combined_requires_both() {
        let previous = bgra(&[[0, 0, 0, 255], [0, 0, 0, 255]]);
        let current = bgra(&[[90, 90, 90, 255], [90, 90, 90, 255]]);
        let next = bgra(&[[0, 0, 0, 255], [90, 90, 90, 255]]);
        let mut out = vec![0u8; current.len()];
        combined_difference(&previous, &current, &next, 10, &mut out);
        // (270 + 270) / 6 = 90; second pixel unchanged against next
        assert_eq!(out, bgra(&[[90, 90, 90, 255], [0, 0, 0, 255]]));
    }

    #[test]
    fn test_combined_maximum_level() {
        let previous = bgra(&[[0, 0, 0, 255]]);
        let current = bgra(&[[255, 255, 255, 255]]);
        let mut out = vec![0u8; 4];
        combined_difference(&previous, &current, &previous, 0, &mut out);
        assert_eq!(out, [255, 255, 255, 255]);
    }

    #[test]
    fn test_is_black() {
        let mut pixels = bgra(&[[0, 0, 0, 255]; 16]);
        assert!(is_black(&pixels));
        pixels[0] = 1;
        assert!(!is_black(&pixels));
        pixels[0] = 0;
        pixels[62] = 1;
        assert!(!is_black(&pixels));
        pixels[62] = 0;
        pixels[63] = 0;
        assert!(is_black(&pixels));
    }

    #[test]
    fn test_dark_counts_stride() {
        // 25 pixels sampled at 0, 10 and 20
        let mut pixels = bgra(&[[200, 0, 0, 255]; 25]);
        for index in [0, 10, 20] {
            pixels[index * 4..index * 4 + 4].copy_from_slice(&[10, 10, 10, 255]);
        }
        let counts = dark_counts(&pixels, 60);
        assert_eq!(
            counts,
            DarkCounts {
                dark: 3,
                greyscale: 3,
                sampled: 3
            }
        );
        assert_eq!(dark_counts_dense(&pixels, 60).sampled, 25);
    }

    #[test]
    fn test_dark_threshold_inclusive() {
        // luminosity exactly 125 * 60
        let pixels = bgra(&[[60, 60, 60, 255]]);
        assert_eq!(dark_counts(&pixels, 60).dark, 1);
        assert_eq!(dark_counts(&pixels, 59).dark, 0);
    }

    #[test]
    fn test_luminosity_totals() {
        let pixels = bgra(&[[255, 255, 255, 255], [0, 0, 255, 255]]);
        let totals = luminosity_totals(&pixels);
        assert_eq!(totals.pixels, 2);
        assert_eq!(totals.luminosity, 125 * 255 + 37 * 255);
        assert_eq!(totals.coloration, 510);
    }
}
