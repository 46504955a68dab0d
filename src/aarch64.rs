//! Wide-lane kernel using aarch64 NEON registers.

#![allow(clippy::missing_safety_doc)]

use crate::{lanes_equal, Isa, Kernel, Vector};
use std::arch::aarch64::*;

impl Vector for uint8x16_t {
    const LANES: usize = 16;

    #[inline]
    #[target_feature(enable = "neon")]
    unsafe fn load(a: &[u8]) -> Self {
        debug_assert!(a.len() >= Self::LANES);
        vld1q_u8(a.as_ptr())
    }

    #[inline]
    #[target_feature(enable = "neon")]
    unsafe fn lanes_eq(a: Self, b: Self) -> Self {
        vceqq_u8(a, b)
    }

    #[inline]
    #[target_feature(enable = "neon")]
    unsafe fn all_set(mask: Self) -> bool {
        // Equal lanes are 0xFF, so the minimum is 0xFF only if all matched.
        vminvq_u8(mask) == u8::MAX
    }
}

/// Kernel comparing 16 bytes per step with NEON.
#[derive(Clone, Copy, Debug)]
pub struct NeonKernel(());

impl NeonKernel {
    /// Creates the kernel without checking for NEON.
    ///
    /// # Safety
    ///
    /// The CPU running the comparison must support NEON.
    pub unsafe fn new_unchecked() -> Self {
        Self(())
    }

    /// Creates the kernel if the running CPU supports NEON.
    pub fn new() -> Option<Self> {
        std::arch::is_aarch64_feature_detected!("neon").then(|| unsafe { Self::new_unchecked() })
    }

    #[target_feature(enable = "neon")]
    unsafe fn equal_neon(left: &[u8], right: &[u8]) -> bool {
        lanes_equal::<uint8x16_t>(left, right)
    }
}

impl Kernel for NeonKernel {
    const STRIDE: usize = Isa::Neon.lanes();

    #[inline]
    fn equal(&self, left: &[u8], right: &[u8]) -> bool {
        // Construction proved NEON is available.
        unsafe { Self::equal_neon(left, right) }
    }
}
