// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{
    scalar,
    sse41::{DIVIDE_BY_3, DIVIDE_BY_3_SHIFT, DIVIDE_BY_6_SHIFT, LUMINOSITY_WEIGHTS},
    DarkCounts, LuminosityTotals, COLOR_MASK, DARK_PIXEL_GROUP_SIMD,
    DARK_PIXEL_GROUP_STRIDE_SIMD, GREYSCALE_PIXEL_THRESHOLD, LUMINOSITY_SCALE, OPAQUE_BLACK,
    PIXEL_BYTES,
};
use std::arch::x86_64::*;

const LANE_BYTES: usize = 32;

#[inline(always)]
unsafe fn load(bytes: &[u8], offset: usize) -> __m256i {
    debug_assert!(offset + LANE_BYTES <= bytes.len());
    _mm256_loadu_si256(bytes.as_ptr().add(offset) as *const __m256i)
}

#[inline(always)]
unsafe fn store(bytes: &mut [u8], offset: usize, value: __m256i) {
    debug_assert!(offset + LANE_BYTES <= bytes.len());
    _mm256_storeu_si256(bytes.as_mut_ptr().add(offset) as *mut __m256i, value)
}

#[inline(always)]
unsafe fn horizontal_sum_epi32(bytes: __m256i) -> __m256i {
    let pairs = _mm256_maddubs_epi16(bytes, _mm256_set1_epi8(1));
    _mm256_madd_epi16(pairs, _mm256_set1_epi16(1))
}

#[inline(always)]
unsafe fn sad_epi32(a: __m256i, b: __m256i) -> __m256i {
    let absolute = _mm256_sub_epi8(_mm256_max_epu8(a, b), _mm256_min_epu8(a, b));
    horizontal_sum_epi32(_mm256_and_si256(
        absolute,
        _mm256_set1_epi32(COLOR_MASK as i32),
    ))
}

#[inline(always)]
unsafe fn grey_or_black(level: __m256i, changed: __m256i) -> __m256i {
    let grey = _mm256_mullo_epi32(level, _mm256_set1_epi32(0x0001_0101));
    _mm256_or_si256(
        _mm256_and_si256(changed, grey),
        _mm256_set1_epi32(OPAQUE_BLACK as i32),
    )
}

/// BGRA to GRBA within each 128-bit half.
#[inline(always)]
unsafe fn rotate_channels(pixels: __m256i) -> __m256i {
    let order = _mm256_setr_epi8(
        1, 2, 0, 3, 5, 6, 4, 7, 9, 10, 8, 11, 13, 14, 12, 15, //
        1, 2, 0, 3, 5, 6, 4, 7, 9, 10, 8, 11, 13, 14, 12, 15,
    );
    _mm256_shuffle_epi8(pixels, order)
}

#[inline(always)]
unsafe fn lanes_set(mask: __m256i) -> usize {
    _mm256_movemask_ps(_mm256_castsi256_ps(mask)).count_ones() as usize
}

#[inline(always)]
unsafe fn sum_epi64(v: __m256i) -> u64 {
    (_mm256_extract_epi64(v, 0)
        + _mm256_extract_epi64(v, 1)
        + _mm256_extract_epi64(v, 2)
        + _mm256_extract_epi64(v, 3)) as u64
}

#[target_feature(enable = "avx2")]
pub(super) unsafe fn difference(current: &[u8], other: &[u8], threshold: u8, out: &mut [u8]) {
    let limit = _mm256_set1_epi32(3 * threshold as i32);
    let reciprocal = _mm256_set1_epi32(DIVIDE_BY_3);
    let full = current.len() - current.len() % LANE_BYTES;

    let mut offset = 0;
    while offset < full {
        let sad = sad_epi32(load(current, offset), load(other, offset));
        let changed = _mm256_cmpgt_epi32(sad, limit);
        let level = _mm256_srli_epi32(_mm256_mullo_epi32(sad, reciprocal), DIVIDE_BY_3_SHIFT);
        store(out, offset, grey_or_black(level, changed));
        offset += LANE_BYTES;
    }
    scalar::difference(&current[full..], &other[full..], threshold, &mut out[full..]);
}

#[target_feature(enable = "avx2")]
pub(super) unsafe fn combined_difference(
    previous: &[u8],
    current: &[u8],
    next: &[u8],
    threshold: u8,
    out: &mut [u8],
) {
    let limit = _mm256_set1_epi32(3 * threshold as i32);
    let reciprocal = _mm256_set1_epi32(DIVIDE_BY_3);
    let full = current.len() - current.len() % LANE_BYTES;

    let mut offset = 0;
    while offset < full {
        let pixels = load(current, offset);
        let sad_previous = sad_epi32(pixels, load(previous, offset));
        let sad_next = sad_epi32(pixels, load(next, offset));
        let changed = _mm256_and_si256(
            _mm256_cmpgt_epi32(sad_previous, limit),
            _mm256_cmpgt_epi32(sad_next, limit),
        );
        let sum = _mm256_add_epi32(sad_previous, sad_next);
        let level = _mm256_srli_epi32(_mm256_mullo_epi32(sum, reciprocal), DIVIDE_BY_6_SHIFT);
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

#[target_feature(enable = "avx2")]
pub(super) unsafe fn is_black(pixels: &[u8]) -> bool {
    let full = pixels.len() - pixels.len() % LANE_BYTES;
    if !scalar::is_black(&pixels[full..]) {
        return false;
    }

    let mask = _mm256_set1_epi32(COLOR_MASK as i32);
    let mut offset = full;
    while offset >= LANE_BYTES {
        offset -= LANE_BYTES;
        if _mm256_testz_si256(load(pixels, offset), mask) == 0 {
            return false;
        }
    }
    true
}

/// Not selected by default; VEX encoded SSE4.1 is faster on average for
/// this memory bound loop.
#[target_feature(enable = "avx2")]
pub(super) unsafe fn dark_counts(pixels: &[u8], dark_pixel_threshold: u8) -> DarkCounts {
    let dark_limit = _mm256_set1_epi32(LUMINOSITY_SCALE * dark_pixel_threshold as i32);
    let grey_limit = _mm256_set1_epi32(GREYSCALE_PIXEL_THRESHOLD);
    let weights = _mm256_set1_epi32(LUMINOSITY_WEIGHTS);
    let stride_bytes = DARK_PIXEL_GROUP_STRIDE_SIMD * PIXEL_BYTES;

    let mut counts = DarkCounts::default();
    let mut offset = 0;
    while offset + LANE_BYTES <= pixels.len() {
        let group = load(pixels, offset);
        let luminosity = _mm256_madd_epi16(
            _mm256_maddubs_epi16(group, weights),
            _mm256_set1_epi16(1),
        );
        let rotated = rotate_channels(group);
        let coloration = horizontal_sum_epi32(_mm256_sub_epi8(
            _mm256_max_epu8(group, rotated),
            _mm256_min_epu8(group, rotated),
        ));
        let bright = _mm256_cmpgt_epi32(luminosity, dark_limit);
        let colored = _mm256_cmpgt_epi32(coloration, grey_limit);
        counts.dark += DARK_PIXEL_GROUP_SIMD - lanes_set(bright);
        counts.greyscale += DARK_PIXEL_GROUP_SIMD - lanes_set(colored);
        counts.sampled += DARK_PIXEL_GROUP_SIMD;
        offset += stride_bytes;
    }
    if offset < pixels.len() {
        counts += scalar::dark_counts_dense(&pixels[offset..], dark_pixel_threshold);
    }
    counts
}

/// Not selected by default, see [`dark_counts`].
#[target_feature(enable = "avx2")]
pub(super) unsafe fn luminosity_totals(pixels: &[u8]) -> LuminosityTotals {
    let weights = _mm256_set1_epi32(LUMINOSITY_WEIGHTS);
    let full = pixels.len() - pixels.len() % LANE_BYTES;
    let mut luminosity = _mm256_setzero_si256();
    let mut coloration = _mm256_setzero_si256();

    let mut offset = 0;
    while offset < full {
        let group = load(pixels, offset);
        let luma = _mm256_madd_epi16(_mm256_maddubs_epi16(group, weights), _mm256_set1_epi16(1));
        luminosity = _mm256_add_epi64(
            luminosity,
            _mm256_cvtepi32_epi64(_mm256_castsi256_si128(luma)),
        );
        luminosity = _mm256_add_epi64(
            luminosity,
            _mm256_cvtepi32_epi64(_mm256_extracti128_si256(luma, 1)),
        );
        coloration = _mm256_add_epi64(
            coloration,
            _mm256_sad_epu8(group, rotate_channels(group)),
        );
        offset += LANE_BYTES;
    }

    let mut totals = scalar::luminosity_totals(&pixels[full..]);
    totals += LuminosityTotals {
        luminosity: sum_epi64(luminosity),
        coloration: sum_epi64(coloration),
        pixels: full / PIXEL_BYTES,
    };
    totals
}
