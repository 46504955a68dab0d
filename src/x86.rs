//! Wide-lane kernels using x86 SSE2 and AVX2 registers.
//!
//! Both kernels compare one register's worth of bytes per step with a
//! byte-wise equality compare and reduce the result to a bitmask; a mask
//! with every lane set means the register pair was equal. The bytes left
//! after the last full register go through the scalar word comparison.

#![allow(clippy::missing_safety_doc)]

use crate::{lanes_equal, Isa, Kernel, Vector};
#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

impl Vector for __m128i {
    const LANES: usize = 16;

    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn load(a: &[u8]) -> Self {
        debug_assert!(a.len() >= Self::LANES);
        _mm_loadu_si128(a.as_ptr().cast())
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn lanes_eq(a: Self, b: Self) -> Self {
        _mm_cmpeq_epi8(a, b)
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn all_set(mask: Self) -> bool {
        _mm_movemask_epi8(mask) == 0xFFFF
    }
}

impl Vector for __m256i {
    const LANES: usize = 32;

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn load(a: &[u8]) -> Self {
        debug_assert!(a.len() >= Self::LANES);
        _mm256_loadu_si256(a.as_ptr().cast())
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn lanes_eq(a: Self, b: Self) -> Self {
        _mm256_cmpeq_epi8(a, b)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn all_set(mask: Self) -> bool {
        _mm256_movemask_epi8(mask) == -1
    }
}

/// Kernel comparing 16 bytes per step with SSE2.
#[derive(Clone, Copy, Debug)]
pub struct Sse2Kernel(());

impl Sse2Kernel {
    /// Creates the kernel without checking for SSE2.
    ///
    /// # Safety
    ///
    /// The CPU running the comparison must support SSE2.
    pub unsafe fn new_unchecked() -> Self {
        Self(())
    }

    /// Creates the kernel if the running CPU supports SSE2.
    pub fn new() -> Option<Self> {
        is_x86_feature_detected!("sse2").then(|| unsafe { Self::new_unchecked() })
    }

    #[target_feature(enable = "sse2")]
    unsafe fn equal_sse2(left: &[u8], right: &[u8]) -> bool {
        lanes_equal::<__m128i>(left, right)
    }
}

impl Kernel for Sse2Kernel {
    const STRIDE: usize = Isa::Sse2.lanes();

    #[inline]
    fn equal(&self, left: &[u8], right: &[u8]) -> bool {
        // Construction proved SSE2 is available.
        unsafe { Self::equal_sse2(left, right) }
    }
}

/// Kernel comparing 32 bytes per step with AVX2.
#[derive(Clone, Copy, Debug)]
pub struct Avx2Kernel(());

impl Avx2Kernel {
    /// Creates the kernel without checking for AVX2.
    ///
    /// # Safety
    ///
    /// The CPU running the comparison must support AVX2.
    pub unsafe fn new_unchecked() -> Self {
        Self(())
    }

    /// Creates the kernel if the running CPU supports AVX2.
    pub fn new() -> Option<Self> {
        is_x86_feature_detected!("avx2").then(|| unsafe { Self::new_unchecked() })
    }

    #[target_feature(enable = "avx2")]
    unsafe fn equal_avx2(left: &[u8], right: &[u8]) -> bool {
        lanes_equal::<__m256i>(left, right)
    }
}

impl Kernel for Avx2Kernel {
    const STRIDE: usize = Isa::Avx2.lanes();

    #[inline]
    fn equal(&self, left: &[u8], right: &[u8]) -> bool {
        // Construction proved AVX2 is available.
        unsafe { Self::equal_avx2(left, right) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check<K: Kernel>(kernel: K) {
        let left: Vec<u8> = (0..K::STRIDE * 5 + 3).map(|i| (i * 7) as u8).collect();
        assert!(kernel.equal(&left, &left.clone()));
        for position in 0..left.len() {
            let mut right = left.clone();
            right[position] = !right[position];
            assert!(!kernel.equal(&left, &right), "missed byte {position}");
        }
    }

    #[test]
    fn sse2_every_position() {
        if let Some(kernel) = Sse2Kernel::new() {
            check(kernel);
        }
    }

    #[test]
    fn avx2_every_position() {
        if let Some(kernel) = Avx2Kernel::new() {
            check(kernel);
        }
    }

    #[test]
    fn stride_is_register_width() {
        assert_eq!(Sse2Kernel::STRIDE, <__m128i as Vector>::LANES);
        assert_eq!(Avx2Kernel::STRIDE, <__m256i as Vector>::LANES);
    }

    #[test]
    fn shorter_than_lane() {
        if let Some(kernel) = Avx2Kernel::new() {
            assert!(kernel.equal(b"foo", b"foo"));
            assert!(!kernel.equal(b"foo", b"bar"));
        }
    }
}
