#![no_main]

use arbitrary::Arbitrary;
use fileeq::{first_difference, DynamicKernel, Isa, KernelKind};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzInput<'a> {
    data: &'a [u8],
    position: usize,
    flip: u8,
}

fuzz_target!(|input: FuzzInput<'_>| {
    let left = input.data;
    let mut right = left.to_vec();

    // Kernels only accept equal lengths, so mutate in place
    if !right.is_empty() && input.flip != 0 {
        let position = input.position % right.len();
        right[position] ^= input.flip;
    }

    let expected = left == &right[..];
    assert_eq!(first_difference(left, &right).is_none(), expected);

    let mut kernels = vec![DynamicKernel::for_kind(KernelKind::Scalar)];
    kernels.extend([Isa::Sse2, Isa::Avx2, Isa::Neon].into_iter().filter_map(DynamicKernel::wide));
    for kernel in kernels {
        assert_eq!(kernel.equal(left, &right), expected, "{:?}", kernel.kind());
    }
});
