// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trailcam_native::{
    dispatch::Tier,
    properties::{
        DEFAULT_DARK_LUMINOSITY_THRESHOLD, DEFAULT_DARK_PIXEL_RATIO, DEFAULT_DARK_PIXEL_THRESHOLD,
        DEFAULT_DIFFERENCE_THRESHOLD,
    },
};

/// Kernel tier selection.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum TierSetting {
    /// Fastest tier the processor supports, per operation
    Auto,
    /// Portable reference kernels
    Scalar,
    /// 128-bit SSE4.1 kernels
    Sse41,
    /// SSE4.1 kernels with VEX encoding
    Sse41Vex,
    /// 256-bit AVX2 kernels
    Avx2,
}

impl TierSetting {
    pub fn tier(self) -> Option<Tier> {
        match self {
            TierSetting::Auto => None,
            TierSetting::Scalar => Some(Tier::Scalar),
            TierSetting::Sse41 => Some(Tier::Sse41),
            TierSetting::Sse41Vex => Some(Tier::Sse41Vex),
            TierSetting::Avx2 => Some(Tier::Avx2),
        }
    }
}

/// Command-line arguments for the trail camera analyzer.
///
/// Global options can also be given through environment variables.
///
/// # Example
///
/// ```bash
/// trailcam-analyze classify --width 1024 DCIM/*.JPG
///
/// export MAX_CONCURRENCY=2
/// trailcam-analyze --json difference IMG_0001.JPG IMG_0002.JPG IMG_0003.JPG
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Maximum threads for scalar kernels, defaults to the physical core count
    #[arg(long, env = "MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Kernel tier to run
    #[arg(long, env = "TIER", default_value = "auto", value_enum)]
    pub tier: TierSetting,

    /// Emit one JSON object per result instead of text
    #[arg(long, env = "JSON")]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long, env = "VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Report detected processor capabilities and selected tiers
    Capabilities,
    /// Classify images as black, dark, greyscale or color
    Classify(ClassifyArgs),
    /// Count changed pixels between two or three frames
    Difference(DifferenceArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ClassifyArgs {
    /// JPEG files to classify
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Decode downscaled to at least this width
    #[arg(long)]
    pub width: Option<u32>,

    /// Luminosity (0-255) at or below which a pixel is dark
    #[arg(long, default_value_t = DEFAULT_DARK_PIXEL_THRESHOLD)]
    pub dark_pixel_threshold: u8,

    /// Fraction of dark pixels which makes a greyscale image dark
    #[arg(long, default_value_t = DEFAULT_DARK_PIXEL_RATIO)]
    pub dark_pixel_ratio: f64,

    /// Rows at the bottom excluded from luminosity, e.g. a camera info bar
    #[arg(long, default_value_t = 0)]
    pub info_bar_rows: u32,

    /// Mean luminosity (0-1) below which a greyscale image is dark
    #[arg(long, default_value_t = DEFAULT_DARK_LUMINOSITY_THRESHOLD)]
    pub dark_luminosity_threshold: f64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DifferenceArgs {
    /// Earlier frame
    pub previous: PathBuf,

    /// Frame to analyze
    pub current: PathBuf,

    /// Later frame, enables the combined three frame difference
    pub next: Option<PathBuf>,

    /// Per channel difference threshold, at least 1 so every changed pixel
    /// has a visible level
    #[arg(
        long,
        default_value_t = DEFAULT_DIFFERENCE_THRESHOLD,
        value_parser = clap::value_parser!(u8).range(1..)
    )]
    pub threshold: u8,

    /// Decode downscaled to at least this width
    #[arg(long)]
    pub width: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_classify_defaults() {
        let args = Args::try_parse_from(["trailcam-analyze", "classify", "a.jpg", "b.jpg"])
            .expect("valid arguments");
        assert_eq!(args.tier, TierSetting::Auto);
        match args.command {
            Command::Classify(classify) => {
                assert_eq!(classify.files.len(), 2);
                assert_eq!(classify.dark_pixel_threshold, 60);
                assert_eq!(classify.info_bar_rows, 0);
                assert_eq!(classify.dark_luminosity_threshold, 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_difference_and_tier() {
        let args = Args::try_parse_from([
            "trailcam-analyze",
            "--tier",
            "sse41-vex",
            "difference",
            "--threshold",
            "12",
            "a.jpg",
            "b.jpg",
        ])
        .expect("valid arguments");
        assert_eq!(args.tier.tier(), Some(Tier::Sse41Vex));
        match args.command {
            Command::Difference(difference) => {
                assert_eq!(difference.threshold, 12);
                assert!(difference.next.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_difference_threshold_positive() {
        let parse = |threshold: &str| {
            Args::try_parse_from([
                "trailcam-analyze",
                "difference",
                "--threshold",
                threshold,
                "a.jpg",
                "b.jpg",
            ])
        };
        assert!(parse("0").is_err());
        assert!(parse("1").is_ok());
        assert!(parse("255").is_ok());
    }
}
