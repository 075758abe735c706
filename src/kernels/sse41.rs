// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! 128-bit kernels. The bodies carry no target feature of their own and are
//! instantiated twice: once for plain SSE4.1 and once, in [`vex`], with AVX
//! enabled so the same intrinsics are emitted as VEX encoded instructions.

use super::{
    scalar, DarkCounts, LuminosityTotals, COLOR_MASK, DARK_PIXEL_GROUP_SIMD,
    DARK_PIXEL_GROUP_STRIDE_SIMD, GREYSCALE_PIXEL_THRESHOLD, LUMINOSITY_BLUE, LUMINOSITY_GREEN,
    LUMINOSITY_RED, LUMINOSITY_SCALE, OPAQUE_BLACK, PIXEL_BYTES,
};
use std::arch::x86_64::*;

const LANE_BYTES: usize = 16;

/// `x * DIVIDE_BY_3 >> 17` is `x / 3` and `x * DIVIDE_BY_3 >> 18` is
/// `x / 6` for every sum of absolute differences a pixel can produce.
pub(super) const DIVIDE_BY_3: i32 = 0xaaab;
pub(super) const DIVIDE_BY_3_SHIFT: i32 = 17;
pub(super) const DIVIDE_BY_6_SHIFT: i32 = 18;

/// B, G, R weights with zero alpha as signed bytes for `maddubs`.
pub(super) const LUMINOSITY_WEIGHTS: i32 = i32::from_le_bytes([
    LUMINOSITY_BLUE as u8,
    LUMINOSITY_GREEN as u8,
    LUMINOSITY_RED as u8,
    0,
]);

#[inline(always)]
unsafe fn load(bytes: &[u8], offset: usize) -> __m128i {
    debug_assert!(offset + LANE_BYTES <= bytes.len());
    _mm_loadu_si128(bytes.as_ptr().add(offset) as *const __m128i)
}

#[inline(always)]
unsafe fn store(bytes: &mut [u8], offset: usize, value: __m128i) {
    debug_assert!(offset + LANE_BYTES <= bytes.len());
    _mm_storeu_si128(bytes.as_mut_ptr().add(offset) as *mut __m128i, value)
}

/// Per pixel `|dB| + |dG| + |dR|` in 32-bit lanes.
#[inline(always)]
unsafe fn sad_epi32(a: __m128i, b: __m128i) -> __m128i {
    let absolute = _mm_sub_epi8(_mm_max_epu8(a, b), _mm_min_epu8(a, b));
    let color = _mm_and_si128(absolute, _mm_set1_epi32(COLOR_MASK as i32));
    horizontal_sum_epi32(color)
}

/// Sums the four bytes of each 32-bit lane.
#[inline(always)]
unsafe fn horizontal_sum_epi32(bytes: __m128i) -> __m128i {
    let pairs = _mm_maddubs_epi16(bytes, _mm_set1_epi8(1));
    _mm_madd_epi16(pairs, _mm_set1_epi16(1))
}

/// Grey pixel `level * 0x010101 | 0xff000000`, or opaque black where
/// `changed` is clear.
#[inline(always)]
unsafe fn grey_or_black(level: __m128i, changed: __m128i) -> __m128i {
    let grey = _mm_mullo_epi32(level, _mm_set1_epi32(0x0001_0101));
    _mm_or_si128(
        _mm_and_si128(changed, grey),
        _mm_set1_epi32(OPAQUE_BLACK as i32),
    )
}

/// Rotates each BGRA pixel to GRBA so `|pixel - rotated|` holds
/// `|B-G|, |G-R|, |R-B|, 0`.
#[inline(always)]
unsafe fn rotate_channels(pixels: __m128i) -> __m128i {
    let order = _mm_setr_epi8(1, 2, 0, 3, 5, 6, 4, 7, 9, 10, 8, 11, 13, 14, 12, 15);
    _mm_shuffle_epi8(pixels, order)
}

#[inline(always)]
unsafe fn luminosity_epi32(pixels: __m128i) -> __m128i {
    let weighted = _mm_maddubs_epi16(pixels, _mm_set1_epi32(LUMINOSITY_WEIGHTS));
    _mm_madd_epi16(weighted, _mm_set1_epi16(1))
}

#[inline(always)]
unsafe fn coloration_epi32(pixels: __m128i) -> __m128i {
    let rotated = rotate_channels(pixels);
    let absolute = _mm_sub_epi8(
        _mm_max_epu8(pixels, rotated),
        _mm_min_epu8(pixels, rotated),
    );
    horizontal_sum_epi32(absolute)
}

#[inline(always)]
unsafe fn lanes_set(mask: __m128i) -> usize {
    _mm_movemask_ps(_mm_castsi128_ps(mask)).count_ones() as usize
}

#[inline(always)]
unsafe fn difference_body(current: &[u8], other: &[u8], threshold: u8, out: &mut [u8]) {
    let limit = _mm_set1_epi32(3 * threshold as i32);
    let reciprocal = _mm_set1_epi32(DIVIDE_BY_3);
    let full = current.len() - current.len() % LANE_BYTES;

    let mut offset = 0;
    while offset < full {
        let sad = sad_epi32(load(current, offset), load(other, offset));
        let changed = _mm_cmpgt_epi32(sad, limit);
        let level = _mm_srli_epi32(_mm_mullo_epi32(sad, reciprocal), DIVIDE_BY_3_SHIFT);
        store(out, offset, grey_or_black(level, changed));
        offset += LANE_BYTES;
    }
    scalar::difference(&current[full..], &other[full..], threshold, &mut out[full..]);
}

#[inline(always)]
unsafe fn combined_difference_body(
    previous: &[u8],
    current: &[u8],
    next: &[u8],
    threshold: u8,
    out: &mut [u8],
) {
    let limit = _mm_set1_epi32(3 * threshold as i32);
    let reciprocal = _mm_set1_epi32(DIVIDE_BY_3);
    let full = current.len() - current.len() % LANE_BYTES;

    let mut offset = 0;
    while offset < full {
        let pixels = load(current, offset);
        let sad_previous = sad_epi32(pixels, load(previous, offset));
        let sad_next = sad_epi32(pixels, load(next, offset));
        let changed = _mm_and_si128(
            _mm_cmpgt_epi32(sad_previous, limit),
            _mm_cmpgt_epi32(sad_next, limit),
        );
        let sum = _mm_add_epi32(sad_previous, sad_next);
        let level = _mm_srli_epi32(_mm_mullo_epi32(sum, reciprocal), DIVIDE_BY_6_SHIFT);
        store(out, offset, grey_or_black(level, changed));
        offset += LANE_BYTES;
    }
    scalar::combined_difference(
        &previous[full..],
        &current[full..],
        &next[full..],
        threshold,
        &mut out[full..],
    );
}

#[inline(always)]
unsafe fn is_black_body(pixels: &[u8]) -> bool {
    let full = pixels.len() - pixels.len() % LANE_BYTES;
    if !scalar::is_black(&pixels[full..]) {
        return false;
    }

    let mask = _mm_set1_epi32(COLOR_MASK as i32);
    let mut offset = full;
    while offset >= LANE_BYTES {
        offset -= LANE_BYTES;
        if _mm_testz_si128(load(pixels, offset), mask) == 0 {
            return false;
        }
    }
    true
}

#[inline(always)]
unsafe fn dark_counts_body(pixels: &[u8], dark_pixel_threshold: u8) -> DarkCounts {
    let dark_limit = _mm_set1_epi32(LUMINOSITY_SCALE * dark_pixel_threshold as i32);
    let grey_limit = _mm_set1_epi32(GREYSCALE_PIXEL_THRESHOLD);
    let group_bytes = DARK_PIXEL_GROUP_SIMD * PIXEL_BYTES;
    let stride_bytes = DARK_PIXEL_GROUP_STRIDE_SIMD * PIXEL_BYTES;

    let mut counts = DarkCounts::default();
    let mut offset = 0;
    while offset + group_bytes <= pixels.len() {
        for lane in [offset, offset + LANE_BYTES] {
            let quad = load(pixels, lane);
            let bright = _mm_cmpgt_epi32(luminosity_epi32(quad), dark_limit);
            let colored = _mm_cmpgt_epi32(coloration_epi32(quad), grey_limit);
            counts.dark += 4 - lanes_set(bright);
            counts.greyscale += 4 - lanes_set(colored);
        }
        counts.sampled += DARK_PIXEL_GROUP_SIMD;
        offset += stride_bytes;
    }
    if offset < pixels.len() {
        counts += scalar::dark_counts_dense(&pixels[offset..], dark_pixel_threshold);
    }
    counts
}

#[inline(always)]
unsafe fn luminosity_totals_body(pixels: &[u8]) -> LuminosityTotals {
    let full = pixels.len() - pixels.len() % LANE_BYTES;
    let mut luminosity = _mm_setzero_si128();
    let mut coloration = _mm_setzero_si128();

    let mut offset = 0;
    while offset < full {
        let quad = load(pixels, offset);
        let luma = luminosity_epi32(quad);
        luminosity = _mm_add_epi64(luminosity, _mm_cvtepi32_epi64(luma));
        luminosity = _mm_add_epi64(
            luminosity,
            _mm_cvtepi32_epi64(_mm_unpackhi_epi64(luma, luma)),
        );
        // alpha is compared with itself and contributes zero
        coloration = _mm_add_epi64(coloration, _mm_sad_epu8(quad, rotate_channels(quad)));
        offset += LANE_BYTES;
    }

    let mut totals = scalar::luminosity_totals(&pixels[full..]);
    totals += LuminosityTotals {
        luminosity: (_mm_extract_epi64(luminosity, 0) + _mm_extract_epi64(luminosity, 1)) as u64,
        coloration: (_mm_extract_epi64(coloration, 0) + _mm_extract_epi64(coloration, 1)) as u64,
        pixels: full / PIXEL_BYTES,
    };
    totals
}

#[target_feature(enable = "sse4.1")]
pub(super) unsafe fn difference(current: &[u8], other: &[u8], threshold: u8, out: &mut [u8]) {
    difference_body(current, other, threshold, out)
}

#[target_feature(enable = "sse4.1")]
pub(super) unsafe fn combined_difference(
    previous: &[u8],
    current: &[u8],
    next: &[u8],
    threshold: u8,
    out: &mut [u8],
) {
    combined_difference_body(previous, current, next, threshold, out)
}

#[target_feature(enable = "sse4.1")]
pub(super) unsafe fn is_black(pixels: &[u8]) -> bool {
    is_black_body(pixels)
}

#[target_feature(enable = "sse4.1")]
pub(super) unsafe fn dark_counts(pixels: &[u8], dark_pixel_threshold: u8) -> DarkCounts {
    dark_counts_body(pixels, dark_pixel_threshold)
}

#[target_feature(enable = "sse4.1")]
pub(super) unsafe fn luminosity_totals(pixels: &[u8]) -> LuminosityTotals {
    luminosity_totals_body(pixels)
}

pub(super) mod vex {
    use super::*;

    #[target_feature(enable = "sse4.1,avx")]
    pub(in crate::kernels) unsafe fn difference(
        current: &[u8],
        other: &[u8],
        threshold: u8,
        out: &mut [u8],
    ) {
        difference_body(current, other, threshold, out)
    }

    #[target_feature(enable = "sse4.1,avx")]
    pub(in crate::kernels) unsafe fn combined_difference(
        previous: &[u8],
        current: &[u8],
        next: &[u8],
        threshold: u8,
        out: &mut [u8],
    ) {
        combined_difference_body(previous, current, next, threshold, out)
    }

    #[target_feature(enable = "sse4.1,avx")]
    pub(in crate::kernels) unsafe fn is_black(pixels: &[u8]) -> bool {
        is_black_body(pixels)
    }

    #[target_feature(enable = "sse4.1,avx")]
    pub(in crate::kernels) unsafe fn dark_counts(
        pixels: &[u8],
        dark_pixel_threshold: u8,
    ) -> DarkCounts {
        dark_counts_body(pixels, dark_pixel_threshold)
    }

    #[target_feature(enable = "sse4.1,avx")]
    pub(in crate::kernels) unsafe fn luminosity_totals(pixels: &[u8]) -> LuminosityTotals {
        luminosity_totals_body(pixels)
    }
}
