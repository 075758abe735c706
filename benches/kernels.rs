// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use criterion::{criterion_group, criterion_main, Criterion};
use trailcam_native::{
    cpu::Capabilities,
    dispatch::{Dispatcher, Tier},
    image::{PixelBuffer, PixelFormat},
};

fn frame(width: u32, height: u32, seed: u32) -> PixelBuffer {
    let mut state = seed | 1;
    let mut img = PixelBuffer::new(width, height, PixelFormat::Bgra32).unwrap();
    for pixel in img.pixels_mut().chunks_exact_mut(4) {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [b, g, r, _] = state.to_le_bytes();
        pixel.copy_from_slice(&[b, g, r, 0xff]);
    }
    img
}

pub fn benchmark_kernels(c: &mut Criterion) {
    let (width, height) = (1920, 1080);
    let previous = frame(width, height, 1);
    let current = frame(width, height, 2);
    let next = frame(width, height, 3);

    for tier in Tier::supported(Capabilities::get()) {
        let dispatcher = Dispatcher::new().with_tier(tier).unwrap();
        let mut group = c.benchmark_group(tier.to_string());
        group.bench_function("difference", |b| {
            b.iter(|| dispatcher.difference(&current, &previous, 20).unwrap())
        });
        group.bench_function("combined_difference", |b| {
            b.iter(|| {
                dispatcher
                    .combined_difference(&previous, &current, &next, 20)
                    .unwrap()
            })
        });
        group.bench_function("is_black", |b| {
            let black = PixelBuffer::new(width, height, PixelFormat::Bgra32).unwrap();
            b.iter(|| dispatcher.is_black(&black).unwrap())
        });
        group.bench_function("is_dark", |b| {
            b.iter(|| dispatcher.is_dark(&current, 60, 0.9).unwrap())
        });
        group.bench_function("luminosity_and_coloration", |b| {
            b.iter(|| dispatcher.luminosity_and_coloration(&current, 0).unwrap())
        });
        group.finish();
    }
}

criterion_group!(benches, benchmark_kernels);
criterion_main!(benches);
