// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Normalized image statistics and the triage verdicts built on them.

use crate::kernels::{DarkCounts, LuminosityTotals, LUMINOSITY_SCALE};
use std::fmt;

/// An image is treated as greyscale when at least this fraction of the
/// sampled pixels are greyscale.
pub const GREYSCALE_IMAGE_THRESHOLD: f64 = 0.9;
/// Mean coloration below which an image reads as greyscale (infrared).
pub const GREYSCALE_COLORATION_THRESHOLD: f64 = 0.005;

pub const DEFAULT_DARK_PIXEL_THRESHOLD: u8 = 60;
pub const DEFAULT_DARK_PIXEL_RATIO: f64 = 0.9;
pub const DEFAULT_DIFFERENCE_THRESHOLD: u8 = 20;
/// Greyscale images are only classified dark when a threshold is chosen.
pub const DEFAULT_DARK_LUMINOSITY_THRESHOLD: f64 = 0.0;

/// Result of IsDark.
///
/// `dark_pixel_fraction` holds the dark fraction of sampled pixels for
/// greyscale images, but `1 - greyscale fraction` when `is_color` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Darkness {
    pub is_dark: bool,
    pub dark_pixel_fraction: f64,
    pub is_color: bool,
}

impl Darkness {
    pub(crate) fn from_counts(counts: DarkCounts, dark_pixel_ratio: f64) -> Self {
        let sampled = counts.sampled.max(1) as f64;
        let greyscale_fraction = counts.greyscale as f64 / sampled;
        if greyscale_fraction < GREYSCALE_IMAGE_THRESHOLD {
            return Darkness {
                is_dark: false,
                dark_pixel_fraction: 1.0 - greyscale_fraction,
                is_color: true,
            };
        }

        let dark_pixel_fraction = counts.dark as f64 / sampled;
        Darkness {
            is_dark: dark_pixel_fraction >= dark_pixel_ratio,
            dark_pixel_fraction,
            is_color: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Color,
    Greyscale,
    Dark,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Classification::Color => write!(f, "color"),
            Classification::Greyscale => write!(f, "greyscale"),
            Classification::Dark => write!(f, "dark"),
        }
    }
}

/// Mean luminosity and coloration, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageProperties {
    pub luminosity: f64,
    pub coloration: f64,
}

impl ImageProperties {
    pub(crate) fn from_totals(totals: LuminosityTotals) -> Self {
        let pixels = totals.pixels.max(1) as f64;
        ImageProperties {
            luminosity: totals.luminosity as f64 / (LUMINOSITY_SCALE as f64 * 255.0 * pixels),
            coloration: totals.coloration as f64 / (510.0 * pixels),
        }
    }

    /// Color images are never dark; greyscale images below
    /// `dark_luminosity_threshold` are.
    pub fn classify(&self, dark_luminosity_threshold: f64) -> Classification {
        if self.coloration >= GREYSCALE_COLORATION_THRESHOLD {
            Classification::Color
        } else if self.luminosity < dark_luminosity_threshold {
            Classification::Dark
        } else {
            Classification::Greyscale
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "luminosity {:.1}%, coloration {:.2}%",
            100.0 * self.luminosity,
            100.0 * self.coloration
        )
    }
}

impl fmt::Display for ImageProperties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
