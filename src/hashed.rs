//! Digest-then-compare.
//!
//! Each file is hashed in full with BLAKE3 and only the two digests are
//! compared. There is no early exit: a mismatch in the first byte still costs
//! a complete pass over both files. What it buys is a fingerprint per file
//! that callers can keep and reuse, which a one-shot chunked comparison
//! cannot give them.

use crate::error::{Error, Result};
use crate::reader::{Chunk, ChunkReader};
use crate::{CancelToken, Stats};
use blake3::Hasher;
use core::fmt::{self, Display};
use core::str::FromStr;
use std::io::Read;

/// BLAKE3 digest of a file's full contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Digest(bytes))
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Digest(*hash.as_bytes())
    }
}

/// Hashes everything left in `reader`, using `chunk` as the read buffer.
pub fn digest_reader<R: Read>(
    reader: &mut ChunkReader<R>,
    chunk: &mut Chunk,
    stats: &mut Stats,
) -> Result<Digest> {
    digest_cancellable(reader, chunk, stats, None)
}

pub(crate) fn digest_cancellable<R: Read>(
    reader: &mut ChunkReader<R>,
    chunk: &mut Chunk,
    stats: &mut Stats,
    cancel: Option<&CancelToken>,
) -> Result<Digest> {
    log::debug!("Computing BLAKE3 hash for file: {:?}", reader.origin());

    let mut hasher = Hasher::new();
    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        let read = reader.next_chunk(chunk)?;
        if read == 0 {
            break;
        }
        stats.record(read);
        hasher.update(chunk.as_slice());
    }
    Ok(hasher.finalize().into())
}

/// Hashes an in-memory buffer, such as a mapped file.
pub fn digest_bytes(bytes: &[u8]) -> Digest {
    log::debug!("Computing BLAKE3 hash for {} bytes", bytes.len());

    blake3::hash(bytes).into()
}

/// Hashes `bytes` in `window`-sized steps, counting each step as a read.
pub(crate) fn digest_windows(
    bytes: &[u8],
    window: usize,
    stats: &mut Stats,
    cancel: Option<&CancelToken>,
) -> Result<Digest> {
    let mut hasher = Hasher::new();
    for window in bytes.chunks(window.max(1)) {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        stats.record(window.len());
        hasher.update(window);
    }
    Ok(hasher.finalize().into())
}
