// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Processor capability detection.
//!
//! The snapshot is taken once, on first use, and is immutable afterwards.
//! Detection never fails hard: anything that cannot be queried falls back to
//! the scalar-only, single-core defaults and the cause is kept for callers to
//! inspect through [`Capabilities::detection_error`].

use std::{fmt, sync::OnceLock};
use tracing::{debug, warn};

static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();

// CPUID leaf 1, ECX
const LEAF1_ECX_SSE41: u32 = 1 << 19;
const LEAF1_ECX_AVX: u32 = 1 << 28;
// CPUID leaf 7 subleaf 0, EBX
const LEAF7_EBX_AVX2: u32 = 1 << 5;

/// Reason a part of capability detection fell back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionError {
    /// CPUID is unavailable or reports no feature leaf.
    CpuidUnavailable,
    /// The operating system did not report any physical cores.
    TopologyUnavailable,
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DetectionError::CpuidUnavailable => {
                write!(f, "cpuid feature leaves unavailable, SIMD disabled")
            }
            DetectionError::TopologyUnavailable => {
                write!(f, "physical core count unavailable, assuming one core")
            }
        }
    }
}

/// Instruction set flags decoded from raw CPUID registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuidFlags {
    pub sse41: bool,
    pub avx: bool,
    pub avx2: bool,
}

impl CpuidFlags {
    /// Decodes leaf 1 ECX and leaf 7 EBX.
    pub fn from_registers(leaf1_ecx: u32, leaf7_ebx: u32) -> Self {
        Self {
            sse41: leaf1_ecx & LEAF1_ECX_SSE41 != 0,
            avx: leaf1_ecx & LEAF1_ECX_AVX != 0,
            avx2: leaf7_ebx & LEAF7_EBX_AVX2 != 0,
        }
    }
}

/// Immutable snapshot of what the processor can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    sse41: bool,
    avx: bool,
    avx2: bool,
    physical_cores: usize,
    error: Option<DetectionError>,
}

impl Capabilities {
    /// Process-wide snapshot, detected on first call.
    pub fn get() -> &'static Capabilities {
        CAPABILITIES.get_or_init(Capabilities::detect)
    }

    /// Queries the processor and operating system.
    pub fn detect() -> Self {
        let caps = Capabilities::from_query(query_cpuid(), num_cpus::get_physical());
        match caps.error {
            Some(err) => warn!("capability detection degraded: {}", err),
            None => debug!("detected {}", caps),
        }
        caps
    }

    /// Builds a snapshot from raw query results. Missing CPUID flags disable
    /// every SIMD tier and zero physical cores becomes one; the first failure
    /// is recorded.
    pub fn from_query(flags: Option<CpuidFlags>, physical_cores: usize) -> Self {
        let mut error = None;

        let flags = match flags {
            Some(flags) => flags,
            None => {
                error = Some(DetectionError::CpuidUnavailable);
                CpuidFlags::default()
            }
        };

        let physical_cores = match physical_cores {
            0 => {
                error.get_or_insert(DetectionError::TopologyUnavailable);
                1
            }
            cores => cores,
        };

        Self {
            sse41: flags.sse41,
            avx: flags.avx,
            avx2: flags.avx2,
            physical_cores,
            error,
        }
    }

    /// Copy of this snapshot with every SIMD tier disabled.
    pub fn without_simd(&self) -> Self {
        Self {
            sse41: false,
            avx: false,
            avx2: false,
            physical_cores: self.physical_cores,
            error: self.error,
        }
    }

    pub fn sse41(&self) -> bool {
        self.sse41
    }

    pub fn avx(&self) -> bool {
        self.avx
    }

    pub fn avx2(&self) -> bool {
        self.avx2
    }

    pub fn physical_cores(&self) -> usize {
        self.physical_cores
    }

    pub fn detection_error(&self) -> Option<DetectionError> {
        self.error
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "sse4.1:{} avx:{} avx2:{} physical cores:{}",
            self.sse41, self.avx, self.avx2, self.physical_cores
        )
    }
}

#[cfg(target_arch = "x86_64")]
// cpuid intrinsics are safe on newer toolchains
#[allow(unused_unsafe)]
fn query_cpuid() -> Option<CpuidFlags> {
    use std::arch::x86_64::{__cpuid, __cpuid_count};

    // SAFETY: cpuid is part of the x86_64 baseline.
    let max_leaf = unsafe { __cpuid(0) }.eax;
    if max_leaf < 1 {
        return None;
    }
    let leaf1_ecx = unsafe { __cpuid(1) }.ecx;
    let leaf7_ebx = if max_leaf >= 7 {
        unsafe { __cpuid_count(7, 0) }.ebx
    } else {
        0
    };

    let mut flags = CpuidFlags::from_registers(leaf1_ecx, leaf7_ebx);
    // CPUID advertises AVX even when the OS has not enabled YMM state
    flags.avx &= std::is_x86_feature_detected!("avx");
    flags.avx2 &= flags.avx && std::is_x86_feature_detected!("avx2");
    Some(flags)
}

#[cfg(not(target_arch = "x86_64"))]
fn query_cpuid() -> Option<CpuidFlags> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_feature_bits() {
        let none = CpuidFlags::from_registers(0, 0);
        assert_eq!(none, CpuidFlags::default());

        let sse41 = CpuidFlags::from_registers(1 << 19, 0);
        assert!(sse41.sse41 && !sse41.avx && !sse41.avx2);

        let all = CpuidFlags::from_registers((1 << 19) | (1 << 28), 1 << 5);
        assert!(all.sse41 && all.avx && all.avx2);

        // neighbouring bits must not leak in
        let noise = CpuidFlags::from_registers(!((1 << 19) | (1 << 28)), !(1 << 5));
        assert_eq!(noise, CpuidFlags::default());
    }

    #[test]
    fn snapshot_is_cached() {
        let first = Capabilities::get();
        let second = Capabilities::get();
        assert!(std::ptr::eq(first, second));
        assert!(first.physical_cores() >= 1);
    }

    #[test]
    fn avx2_implies_avx() {
        let caps = Capabilities::detect();
        if caps.avx2() {
            assert!(caps.avx());
        }
    }

    #[test]
    fn cpuid_failure_falls_back() {
        let caps = Capabilities::from_query(None, 8);
        assert!(!caps.sse41() && !caps.avx() && !caps.avx2());
        assert_eq!(caps.physical_cores(), 8);
        assert_eq!(caps.detection_error(), Some(DetectionError::CpuidUnavailable));
    }

    #[test]
    fn topology_failure_falls_back() {
        let flags = CpuidFlags::from_registers(1 << 19, 0);
        let caps = Capabilities::from_query(Some(flags), 0);
        assert!(caps.sse41());
        assert_eq!(caps.physical_cores(), 1);
        assert_eq!(
            caps.detection_error(),
            Some(DetectionError::TopologyUnavailable)
        );

        // cpuid failure is reported first when both fail
        let caps = Capabilities::from_query(None, 0);
        assert!(!caps.sse41() && !caps.avx() && !caps.avx2());
        assert_eq!(caps.physical_cores(), 1);
        assert_eq!(caps.detection_error(), Some(DetectionError::CpuidUnavailable));
    }

    #[test]
    fn successful_query_has_no_error() {
        let flags = CpuidFlags::from_registers((1 << 19) | (1 << 28), 1 << 5);
        let caps = Capabilities::from_query(Some(flags), 4);
        assert!(caps.sse41() && caps.avx() && caps.avx2());
        assert_eq!(caps.detection_error(), None);
    }

    #[test]
    fn without_simd_keeps_cores() {
        let caps = Capabilities::detect();
        let scalar = caps.without_simd();
        assert!(!scalar.sse41() && !scalar.avx() && !scalar.avx2());
        assert_eq!(scalar.physical_cores(), caps.physical_cores());
    }
}
