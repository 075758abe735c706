// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Process-wide parallelism cap for scalar block processing.
//!
//! The cap is fixed on first use: either explicitly through [`configure`]
//! at startup or implicitly as the physical core count. The worker pool is
//! built lazily from it and lives for the rest of the process.

use crate::{
    cpu::Capabilities,
    error::{Error, Result},
};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::OnceLock;
use tracing::debug;

static MAX_CONCURRENCY: OnceLock<usize> = OnceLock::new();
static POOL: OnceLock<ThreadPool> = OnceLock::new();

/// Sets the maximum number of threads used by scalar kernels.
///
/// # Errors
///
/// Zero is rejected. Fails with [`Error::PolicyConfigured`] once the cap
/// has been set or read.
pub fn configure(threads: usize) -> Result<()> {
    if threads == 0 {
        return Err(Error::InvalidParameter(
            "maximum concurrency must be at least 1".to_owned(),
        ));
    }
    MAX_CONCURRENCY
        .set(threads)
        .map_err(|_| Error::PolicyConfigured(max_concurrency()))?;
    debug!("maximum concurrency set to {}", threads);
    Ok(())
}

/// The configured cap, defaulting to the physical core count.
pub fn max_concurrency() -> usize {
    *MAX_CONCURRENCY.get_or_init(|| Capabilities::get().physical_cores())
}

pub(crate) fn thread_pool() -> Result<&'static ThreadPool> {
    if let Some(pool) = POOL.get() {
        return Ok(pool);
    }
    let threads = max_concurrency();
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("trailcam-block-{}", index))
        .build()?;
    debug!("built block pool with {} threads", threads);
    Ok(POOL.get_or_init(|| pool))
}
