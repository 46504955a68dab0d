//! Choice of comparison kernel and chunk size.
//!
//! [`select`] is a pure function of the common file length, the CPU
//! capabilities and the caller's preferences. It performs no I/O.

use std::fmt;
use std::sync::OnceLock;

/// Every chunk size is a multiple of this, which covers both the 8-byte
/// scalar word and the widest 32-byte lane.
pub const STRIDE_ALIGN: usize = 32;

/// Files up to this length are compared as a single chunk.
pub const SMALL_FILE_THRESHOLD: u64 = 64 * 1024;

/// Chunk size for files above [`SMALL_FILE_THRESHOLD`].
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Wide-lane instruction sets the kernels know how to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Isa {
    /// x86 SSE2, 16 lanes.
    Sse2,
    /// x86 AVX2, 32 lanes.
    Avx2,
    /// aarch64 NEON, 16 lanes.
    Neon,
}

impl Isa {
    /// Bytes compared per register.
    pub const fn lanes(self) -> usize {
        match self {
            Isa::Sse2 | Isa::Neon => 16,
            Isa::Avx2 => 32,
        }
    }
}

/// Instruction sets available on the running CPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// AVX2 is available.
    pub avx2: bool,
    /// SSE2 is available.
    pub sse2: bool,
    /// NEON is available.
    pub neon: bool,
}

impl Capabilities {
    /// No wide-lane instruction set at all.
    pub const fn none() -> Self {
        Self {
            avx2: false,
            sse2: false,
            neon: false,
        }
    }

    /// Probes the running CPU once and caches the answer.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<Capabilities> = OnceLock::new();
        *DETECTED.get_or_init(probe)
    }

    /// Widest instruction set present, if any.
    pub fn widest(&self) -> Option<Isa> {
        [Isa::Avx2, Isa::Sse2, Isa::Neon]
            .into_iter()
            .find(|&isa| self.supports(isa))
    }

    /// Returns `true` if kernels for `isa` can run.
    pub fn supports(&self, isa: Isa) -> bool {
        match isa {
            Isa::Sse2 => self.sse2,
            Isa::Avx2 => self.avx2,
            Isa::Neon => self.neon,
        }
    }
}

fn probe() -> Capabilities {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
            Capabilities {
                avx2: is_x86_feature_detected!("avx2"),
                sse2: is_x86_feature_detected!("sse2"),
                neon: false,
            }
        } else if #[cfg(target_arch = "aarch64")] {
            Capabilities {
                avx2: false,
                sse2: false,
                neon: std::arch::is_aarch64_feature_detected!("neon"),
            }
        } else {
            Capabilities::none()
        }
    }
}

/// What the caller asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Widest available wide-lane kernel, scalar otherwise. Resolves
    /// exactly like [`Strategy::WideLane`]; it is the default so callers
    /// that never pick a kernel get the fastest one available.
    #[default]
    Auto,
    /// Word-at-a-time comparison.
    Scalar,
    /// Lane-at-a-time comparison, falling back to scalar if the CPU has no
    /// usable instruction set. Same resolution as [`Strategy::Auto`].
    WideLane,
    /// Hash both files fully and compare digests.
    Hashed,
}

/// Kernel resolved for one comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelKind {
    /// See [`ScalarKernel`](crate::ScalarKernel).
    Scalar,
    /// Lane comparison with the given instruction set.
    WideLane(Isa),
    /// See [`hashed`](crate::hashed).
    Hashed,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelKind::Scalar => f.write_str("scalar"),
            KernelKind::WideLane(Isa::Sse2) => f.write_str("sse2"),
            KernelKind::WideLane(Isa::Avx2) => f.write_str("avx2"),
            KernelKind::WideLane(Isa::Neon) => f.write_str("neon"),
            KernelKind::Hashed => f.write_str("blake3"),
        }
    }
}

/// Kernel plus chunk size, fixed for the whole comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plan {
    /// Kernel every chunk pair goes through.
    pub kernel: KernelKind,
    /// Capacity of every chunk. Always a multiple of [`STRIDE_ALIGN`].
    pub chunk_size: usize,
}

/// Largest chunk size that is still a multiple of [`STRIDE_ALIGN`].
const MAX_ALIGNED: usize = usize::MAX - usize::MAX % STRIDE_ALIGN;

/// Rounds `value` up to a non-zero multiple of [`STRIDE_ALIGN`], saturating
/// at [`MAX_ALIGNED`].
#[inline]
fn align_up(value: u64) -> usize {
    let align = STRIDE_ALIGN as u64;
    value
        .max(1)
        .div_ceil(align)
        .checked_mul(align)
        .and_then(|aligned| usize::try_from(aligned).ok())
        .unwrap_or(MAX_ALIGNED)
}

/// Picks the kernel and chunk size for comparing two files of `len` bytes.
///
/// An explicit `chunk_size` is rounded up to [`STRIDE_ALIGN`] and never
/// exceeds the file length rounded the same way.
pub fn select(
    len: u64,
    capabilities: Capabilities,
    strategy: Strategy,
    chunk_size: Option<usize>,
) -> Plan {
    let kernel = match strategy {
        Strategy::Scalar => KernelKind::Scalar,
        Strategy::Hashed => KernelKind::Hashed,
        Strategy::Auto | Strategy::WideLane => match capabilities.widest() {
            Some(isa) => KernelKind::WideLane(isa),
            None => KernelKind::Scalar,
        },
    };

    let chunk_size = match chunk_size {
        Some(size) => align_up(size as u64).min(align_up(len)),
        None if len <= SMALL_FILE_THRESHOLD => align_up(len),
        None => DEFAULT_CHUNK_SIZE,
    };

    Plan { kernel, chunk_size }
}
