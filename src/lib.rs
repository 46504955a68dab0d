//! Fast byte-for-byte file equality.
//!
//! Two files are compared by cheap metadata checks first (sizes, then a
//! path-identity shortcut) and, only if those are inconclusive, by pulling
//! paired chunks from both files and handing them to a comparison kernel.
//! The first chunk pair that differs ends the comparison; no later chunk of
//! either file is read.
//!
//! Kernels compare a machine word ([`ScalarKernel`]) or a SIMD register
//! (SSE2, AVX2 or NEON) at a time. A third strategy hashes both files in full
//! and compares the digests, see [`hashed`]. Which kernel runs is decided once
//! per comparison by [`select`] from the file length and the CPU's
//! capabilities; a wide-lane kernel is never chosen on a CPU that cannot run
//! it.
//!
//! # Example
//!
//! ```no_run
//! use fileeq::{Engine, Options, ReadMode, Strategy, Verdict};
//!
//! let engine = Engine::with_options(
//!     Options::default()
//!         .strategy(Strategy::WideLane)
//!         .read_mode(ReadMode::Concurrent),
//! );
//!
//! let outcome = engine.compare("disk.img", "disk.img.bak")?;
//! if outcome.verdict() == Verdict::NotEqual {
//!     println!("differ: {}", outcome.reason());
//! }
//! # Ok::<(), fileeq::Error>(())
//! ```

#![warn(missing_docs)]

/// Wide-lane kernels using x86 architecture features.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod x86;

/// Wide-lane kernel using aarch64 architecture features.
#[cfg(target_arch = "aarch64")]
pub mod aarch64;

pub mod hashed;
pub mod selector;

mod bits;
mod concurrent;
mod engine;
mod error;
mod mapped;
mod reader;
mod scalar;

pub use bits::first_difference;
pub use engine::{files_equal, CancelToken, Engine, Options, Outcome, ReadMode, Reason, Stats, Verdict};
pub use error::{Error, Result};
pub use hashed::Digest;
pub use mapped::MappedFile;
pub use reader::{Chunk, ChunkReader};
pub use scalar::ScalarKernel;
pub use selector::{select, Capabilities, Isa, KernelKind, Plan, Strategy};

/// Equality test over two byte buffers of the same length.
///
/// Passing buffers of different lengths is a bug in the caller; kernels only
/// check it in debug builds.
pub trait Kernel {
    /// Bytes compared per step of the hot loop.
    const STRIDE: usize;

    /// Returns `true` if `left` and `right` hold the same bytes.
    fn equal(&self, left: &[u8], right: &[u8]) -> bool;
}

/// SIMD register type shared by the architecture-specific kernels.
#[allow(dead_code)]
pub(crate) trait Vector: Copy {
    const LANES: usize;

    /// Loads `LANES` bytes from the start of `a`, which must hold at least
    /// that many.
    unsafe fn load(a: &[u8]) -> Self;

    unsafe fn lanes_eq(a: Self, b: Self) -> Self;

    /// Returns `true` if every lane of a `lanes_eq` result is set.
    unsafe fn all_set(mask: Self) -> bool;
}

/// Compares register-sized slices of `left` and `right`, stopping at the
/// first register pair that differs. The partial register at the end goes
/// through the scalar word comparison.
#[inline(always)]
#[allow(dead_code)]
pub(crate) unsafe fn lanes_equal<V: Vector>(left: &[u8], right: &[u8]) -> bool {
    debug_assert_eq!(left.len(), right.len());

    let mut left_lanes = left.chunks_exact(V::LANES);
    let mut right_lanes = right.chunks_exact(V::LANES);
    for (l, r) in (&mut left_lanes).zip(&mut right_lanes) {
        if !V::all_set(V::lanes_eq(V::load(l), V::load(r))) {
            return false;
        }
    }

    scalar::words_equal(left_lanes.remainder(), right_lanes.remainder())
}

/// Chunk kernel picked at runtime.
///
/// Only constructible for instruction sets the running CPU actually has, so
/// dispatching through it is always safe.
#[derive(Clone, Copy, Debug)]
pub enum DynamicKernel {
    /// Word-at-a-time comparison.
    Scalar(ScalarKernel),
    /// SSE2 lanes.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Sse2(x86::Sse2Kernel),
    /// AVX2 lanes.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Avx2(x86::Avx2Kernel),
    /// NEON lanes.
    #[cfg(target_arch = "aarch64")]
    Neon(aarch64::NeonKernel),
}

impl DynamicKernel {
    /// Kernel for `isa`, or `None` if the running CPU cannot execute it.
    pub fn wide(isa: Isa) -> Option<Self> {
        match isa {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Isa::Sse2 => x86::Sse2Kernel::new().map(Self::Sse2),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Isa::Avx2 => x86::Avx2Kernel::new().map(Self::Avx2),
            #[cfg(target_arch = "aarch64")]
            Isa::Neon => aarch64::NeonKernel::new().map(Self::Neon),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Kernel for a resolved plan. A wide-lane request the CPU cannot serve
    /// fails closed to scalar; so does [`KernelKind::Hashed`], which has no
    /// chunk kernel of its own.
    pub fn for_kind(kind: KernelKind) -> Self {
        match kind {
            KernelKind::WideLane(isa) => Self::wide(isa).unwrap_or_else(|| {
                log::warn!("{isa:?} kernel unavailable on this CPU, using scalar");
                Self::Scalar(ScalarKernel)
            }),
            KernelKind::Scalar | KernelKind::Hashed => Self::Scalar(ScalarKernel),
        }
    }

    /// Kind actually running.
    pub fn kind(&self) -> KernelKind {
        match self {
            Self::Scalar(_) => KernelKind::Scalar,
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Sse2(_) => KernelKind::WideLane(Isa::Sse2),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Avx2(_) => KernelKind::WideLane(Isa::Avx2),
            #[cfg(target_arch = "aarch64")]
            Self::Neon(_) => KernelKind::WideLane(Isa::Neon),
        }
    }

    /// Inlined version of `equal` for hot call sites.
    #[inline]
    pub fn inlined_equal(&self, left: &[u8], right: &[u8]) -> bool {
        match self {
            Self::Scalar(kernel) => kernel.equal(left, right),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Sse2(kernel) => kernel.equal(left, right),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Avx2(kernel) => kernel.equal(left, right),
            #[cfg(target_arch = "aarch64")]
            Self::Neon(kernel) => kernel.equal(left, right),
        }
    }

    /// Returns `true` if `left` and `right` hold the same bytes.
    pub fn equal(&self, left: &[u8], right: &[u8]) -> bool {
        self.inlined_equal(left, right)
    }
}
