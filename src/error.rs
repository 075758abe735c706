// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Error types shared by decoding, dispatch and the analysis kernels.

use crate::{dispatch::Tier, image::PixelFormat};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The compressed header could not be parsed.
    #[error("unable to decode jpeg header: {0}")]
    Decode(#[from] turbojpeg::Error),

    #[error("byte range {offset}+{length} is outside the {available} byte input")]
    InvalidRange {
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unhandled pixel format {format} ({bytes_per_pixel} bytes per pixel)")]
    UnsupportedFormat {
        format: PixelFormat,
        bytes_per_pixel: usize,
    },

    #[error("images differ: {left} vs {right}")]
    Mismatched { left: String, right: String },

    #[error("dark pixel ratio threshold {0:.3} is not between 0 and 1, inclusive")]
    RatioOutOfRange(f64),

    #[error("{0} kernels are not supported by this processor")]
    UnsupportedTier(Tier),

    #[error("concurrency policy is already configured ({0} threads)")]
    PolicyConfigured(usize),

    #[error("unable to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
