// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use criterion::{criterion_group, criterion_main, Criterion};
use trailcam_native::image::PixelBuffer;
use turbojpeg::Subsamp;

fn noise_jpeg(width: usize, height: usize) -> Vec<u8> {
    let mut state = 0x2545_f491u32;
    let pixels = (0..width * height * 3)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect::<Vec<_>>();
    let image = turbojpeg::Image {
        pixels: pixels.as_slice(),
        width,
        pitch: width * 3,
        height,
        format: turbojpeg::PixelFormat::RGB,
    };
    turbojpeg::compress(image, 90, Subsamp::Sub2x2)
        .unwrap()
        .to_vec()
}

pub fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let jpeg = noise_jpeg(3840, 2160);
    for requested in [None, Some(1920), Some(1280), Some(960), Some(480)] {
        let name = match requested {
            Some(width) => format!("3840x2160 to {}", width),
            None => "3840x2160".to_owned(),
        };
        group.bench_with_input(name, &requested, |b, requested| {
            b.iter(|| PixelBuffer::decode(&jpeg, *requested).unwrap())
        });
    }

    let mut reused = PixelBuffer::decode(&jpeg, Some(960)).unwrap();
    group.bench_function("3840x2160 to 960 reused", |b| {
        b.iter(|| reused.try_decode(&jpeg, Some(960)).unwrap())
    });
}

criterion_group!(benches, benchmark_decode);
criterion_main!(benches);
