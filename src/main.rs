// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::{Args, ClassifyArgs, Command, DifferenceArgs};
use clap::Parser;
use serde_json::json;
use std::{error::Error, fs, io, path::Path, time::Instant};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use trailcam_native::{
    dispatch::{Dispatcher, Operation, Tier},
    image::PixelBuffer,
    kernels::PIXEL_BYTES,
    policy,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(max_concurrency) = args.max_concurrency {
        policy::configure(max_concurrency)?;
    }
    let dispatcher = match args.tier.tier() {
        Some(tier) => Dispatcher::new().with_tier(tier)?,
        None => Dispatcher::new(),
    };

    match &args.command {
        Command::Capabilities => capabilities(&dispatcher, args.json),
        Command::Classify(classify_args) => classify(&dispatcher, classify_args, args.json),
        Command::Difference(difference_args) => {
            difference(&dispatcher, difference_args, args.json)
        }
    }
}

fn capabilities(dispatcher: &Dispatcher, as_json: bool) -> Result<(), Box<dyn Error>> {
    let caps = dispatcher.capabilities();
    let operations = [
        ("difference", Operation::Difference),
        ("combined_difference", Operation::CombinedDifference),
        ("is_black", Operation::IsBlack),
        ("is_dark", Operation::IsDark),
        ("luminosity_and_coloration", Operation::LuminosityAndColoration),
    ];

    if as_json {
        let tiers = operations
            .iter()
            .map(|(name, operation)| {
                let tier = dispatcher.tier(*operation).to_string();
                (name.to_string(), json!(tier))
            })
            .collect::<serde_json::Map<_, _>>();
        let msg = json!({
            "sse41": caps.sse41(),
            "avx": caps.avx(),
            "avx2": caps.avx2(),
            "physical_cores": caps.physical_cores(),
            "max_concurrency": policy::max_concurrency(),
            "detection_error": caps.detection_error().map(|err| err.to_string()),
            "supported": Tier::supported(caps).map(|tier| tier.to_string()).collect::<Vec<_>>(),
            "tiers": tiers,
        });
        println!("{}", msg);
        return Ok(());
    }

    println!("{}", caps);
    if let Some(err) = caps.detection_error() {
        println!("detection: {}", err);
    }
    println!("max concurrency: {}", policy::max_concurrency());
    for (name, operation) in operations {
        println!("{:>26}: {}", name, dispatcher.tier(operation));
    }
    Ok(())
}

fn decode(path: &Path, width: Option<u32>) -> Result<PixelBuffer, Box<dyn Error>> {
    let jpeg = fs::read(path)?;
    let img = PixelBuffer::decode(&jpeg, width)?;
    if img.decode_error() {
        warn!("{} is truncated or corrupt, analyzing partial image", path.display());
    }
    debug!("decoded {} as {}", path.display(), img);
    Ok(img)
}

fn classify(
    dispatcher: &Dispatcher,
    args: &ClassifyArgs,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut failed = 0;
    for path in &args.files {
        if let Err(err) = classify_one(dispatcher, args, path, as_json) {
            error!("{}: {}", path.display(), err);
            failed += 1;
        }
    }
    info!(
        "classified {} of {} images",
        args.files.len() - failed,
        args.files.len()
    );

    if failed > 0 {
        return Err(format!("{} images could not be classified", failed).into());
    }
    Ok(())
}

fn classify_one(
    dispatcher: &Dispatcher,
    args: &ClassifyArgs,
    path: &Path,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let img = decode(path, args.width)?;
    let black = dispatcher.is_black(&img)?;
    let darkness = dispatcher.is_dark(&img, args.dark_pixel_threshold, args.dark_pixel_ratio)?;
    let properties = dispatcher.luminosity_and_coloration(&img, args.info_bar_rows)?;
    let classification = properties.classify(args.dark_luminosity_threshold);
    let elapsed = start.elapsed();

    if as_json {
        let msg = json!({
            "file": path.display().to_string(),
            "width": img.width(),
            "height": img.height(),
            "decode_error": img.decode_error(),
            "black": black,
            "dark": darkness.is_dark,
            "color": darkness.is_color,
            "dark_pixel_fraction": darkness.dark_pixel_fraction,
            "luminosity": properties.luminosity,
            "coloration": properties.coloration,
            "classification": classification.to_string(),
            "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
        });
        println!("{}", msg);
    } else {
        let verdict = if black {
            "black".to_owned()
        } else if darkness.is_dark {
            format!("dark ({:.0}% dark pixels)", 100.0 * darkness.dark_pixel_fraction)
        } else {
            classification.to_string()
        };
        println!(
            "{}: {}, {}, {} in {:.1?}",
            path.display(),
            verdict,
            properties,
            img,
            elapsed
        );
    }
    Ok(())
}

fn difference(
    dispatcher: &Dispatcher,
    args: &DifferenceArgs,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let previous = decode(&args.previous, args.width)?;
    let current = decode(&args.current, args.width)?;

    let start = Instant::now();
    let motion = match &args.next {
        Some(next) => {
            let next = decode(next, args.width)?;
            dispatcher.combined_difference(&previous, &current, &next, args.threshold)?
        }
        None => dispatcher.difference(&current, &previous, args.threshold)?,
    };
    let elapsed = start.elapsed();

    // thresholds are at least 1, so every changed pixel has a non-zero level
    let changed = motion
        .pixels()
        .chunks_exact(PIXEL_BYTES)
        .filter(|pixel| pixel[0] != 0)
        .count();
    let total = motion.total_pixels();

    if as_json {
        let msg = json!({
            "file": args.current.display().to_string(),
            "changed_pixels": changed,
            "total_pixels": total,
            "changed_fraction": changed as f64 / total as f64,
            "threshold": args.threshold,
            "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
        });
        println!("{}", msg);
    } else {
        println!(
            "{}: {} of {} pixels changed ({:.2}%) in {:.1?}",
            args.current.display(),
            changed,
            total,
            100.0 * changed as f64 / total as f64,
            elapsed
        );
    }
    Ok(())
}
