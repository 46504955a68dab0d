use crate::Kernel;
use seq_macro::seq;
use std::mem::size_of;

const WORD: usize = size_of::<u64>();
const BLOCK: usize = 4 * WORD;

#[inline(always)]
fn word(bytes: &[u8], index: usize) -> u64 {
    let mut buf = [0; WORD];
    buf.copy_from_slice(&bytes[index * WORD..(index + 1) * WORD]);
    u64::from_ne_bytes(buf)
}

/// Compares `left` and `right` one 64-bit word at a time, four words per
/// step, with a byte-wise tail for lengths that are not a multiple of eight.
///
/// Returns `false` as soon as a differing block is seen.
#[inline]
pub(crate) fn words_equal(left: &[u8], right: &[u8]) -> bool {
    debug_assert_eq!(left.len(), right.len());

    let mut left_blocks = left.chunks_exact(BLOCK);
    let mut right_blocks = right.chunks_exact(BLOCK);
    for (l, r) in (&mut left_blocks).zip(&mut right_blocks) {
        let diff = seq!(N in 0..4 { #( (word(l, N) ^ word(r, N)) | )* 0 });
        if diff != 0 {
            return false;
        }
    }

    let mut left_words = left_blocks.remainder().chunks_exact(WORD);
    let mut right_words = right_blocks.remainder().chunks_exact(WORD);
    for (l, r) in (&mut left_words).zip(&mut right_words) {
        if word(l, 0) != word(r, 0) {
            return false;
        }
    }

    left_words.remainder() == right_words.remainder()
}

/// Portable kernel comparing machine words. Always available, and the
/// fallback whenever no wide-lane instruction set is.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarKernel;

impl Kernel for ScalarKernel {
    const STRIDE: usize = WORD;

    #[inline]
    fn equal(&self, left: &[u8], right: &[u8]) -> bool {
        words_equal(left, right)
    }
}
