// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # Trail Camera Image Analysis
//!
//! This library decodes field camera frames and computes the statistics used
//! to triage them automatically: motion between frames, black video lead-in
//! frames, night (dark) and infrared (greyscale) images.
//!
//! ## Features
//!
//! - **Pixel Buffers**: 32-byte aligned, padded BGRA buffers that SIMD kernels
//!   can stream through without tail handling on the padding.
//! - **JPEG Decoding**: turbojpeg decoding with DCT downscaling to a requested
//!   width, buffer reuse, and tolerance of truncated files.
//! - **Runtime Dispatch**: scalar, SSE4.1, VEX encoded SSE4.1 and AVX2 kernels
//!   selected from the processor's capabilities.
//! - **Bounded Parallelism**: a process-wide concurrency cap for the scalar
//!   fallback, configured once at startup.
//!
//! ## Example
//!
//! ```no_run
//! use trailcam_native::{dispatch::Dispatcher, image::PixelBuffer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let previous = PixelBuffer::decode(&std::fs::read("IMG_0001.JPG")?, Some(1024))?;
//! let current = PixelBuffer::decode(&std::fs::read("IMG_0002.JPG")?, Some(1024))?;
//!
//! let dispatcher = Dispatcher::new();
//! let motion = dispatcher.difference(&current, &previous, 20)?;
//! let darkness = dispatcher.is_dark(&current, 60, 0.9)?;
//! println!("{} dark: {}", motion, darkness.is_dark);
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **x86_64**: SSE4.1, AVX and AVX2 tiers are used when the processor and
//!   operating system support them.
//! - **Other architectures**: the scalar tier is always available.
//!
//! ## Safety
//!
//! SIMD kernels are `unsafe` `target_feature` functions. They are private to
//! [`kernels`] and only reached through [`dispatch::Dispatcher`], which never
//! selects a tier the capability snapshot lacks.

pub mod cpu;
pub mod dispatch;
pub mod error;
pub mod image;
pub mod jpeg;
pub mod kernels;
pub mod policy;
pub mod properties;

pub use error::{Error, Result};
