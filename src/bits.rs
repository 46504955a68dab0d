/// Index of the first byte where `left` and `right` differ, or `None` if the
/// common prefix covers the shorter of the two.
///
/// Only used to report where a mismatch was found, after a kernel already
/// rejected the chunk pair.
#[multiversion::multiversion]
#[clone(target = "[x86|x86_64]+avx2")]
pub fn first_difference(left: &[u8], right: &[u8]) -> Option<usize> {
    left.iter().zip(right).position(|(l, r)| l != r)
}

#[cfg(test)]
mod tests {
    use super::first_difference;

    #[test]
    fn same() {
        assert_eq!(first_difference(b"foobar", b"foobar"), None);
    }

    #[test]
    fn first_byte() {
        assert_eq!(first_difference(b"foobar", b"xoobar"), Some(0));
    }

    #[test]
    fn last_byte() {
        assert_eq!(first_difference(b"foobar", b"foobaz"), Some(5));
    }

    #[test]
    fn prefix_only() {
        assert_eq!(first_difference(b"foo", b"foobar"), None);
    }
}
