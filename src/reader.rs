//! Sequential fixed-size reads over a single file.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Fixed-capacity byte buffer plus the number of bytes actually filled.
///
/// The capacity is chosen once per comparison. Only the final chunk of a
/// file can come back shorter than the capacity.
pub struct Chunk {
    buf: Box<[u8]>,
    len: usize,
}

impl Chunk {
    /// Allocates a zeroed chunk able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Maximum number of bytes one read fills.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of valid bytes from the last read.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the last read hit end-of-stream immediately.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid bytes from the last read.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Owns one open read-only stream and hands it out in chunk-sized pieces.
///
/// The stream is closed when the reader is dropped, which covers early
/// returns on mismatch as well as errors propagating out of a read.
pub struct ChunkReader<R = File> {
    inner: R,
    origin: PathBuf,
    position: u64,
}

impl ChunkReader<File> {
    /// Opens `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        log::trace!("Opened {:?} for chunked reading", path);
        Ok(Self::with_origin(file, path))
    }
}

impl<R: Read> ChunkReader<R> {
    /// Wraps an already-open stream. Errors name `origin` as the file.
    pub fn with_origin(inner: R, origin: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            origin: origin.into(),
            position: 0,
        }
    }

    /// Path used when reporting errors for this stream.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fills `chunk` from offset 0 with up to `chunk.capacity()` bytes and
    /// returns how many were read. Zero means end-of-stream.
    ///
    /// Short reads from the underlying stream are retried until the chunk is
    /// full or the stream is exhausted, so only the last chunk of a stream is
    /// ever shorter than the capacity.
    pub fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<usize> {
        chunk.len = 0;
        let filled = fill(&mut self.inner, &mut chunk.buf).map_err(|e| Error::io(&self.origin, e))?;
        chunk.len = filled;
        self.position += filled as u64;
        Ok(filled)
    }
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Chunk, ChunkReader};
    use crate::Error;
    use std::io::{self, Read};

    /// Hands out at most `step` bytes per `read` and interrupts every other
    /// call.
    pub(crate) struct Trickle<'a> {
        pub(crate) data: &'a [u8],
        pub(crate) step: usize,
        pub(crate) interrupt: bool,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::ErrorKind::Interrupted.into());
            }
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    struct Failing;

    impl Read for Failing {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device error"))
        }
    }

    #[test]
    fn short_reads_fill_whole_chunk() {
        let data: Vec<u8> = (0..100).collect();
        let source = Trickle {
            data: &data,
            step: 7,
            interrupt: false,
        };
        let mut reader = ChunkReader::with_origin(source, "trickle");
        let mut chunk = Chunk::with_capacity(32);

        let mut sizes = Vec::new();
        loop {
            let n = reader.next_chunk(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            assert_eq!(chunk.as_slice(), &data[reader.position() as usize - n..][..n]);
            sizes.push(n);
        }

        assert_eq!(sizes, [32, 32, 32, 4]);
        assert_eq!(reader.position(), 100);
    }

    #[test]
    fn end_of_stream_is_zero() {
        let mut reader = ChunkReader::with_origin(&b""[..], "empty");
        let mut chunk = Chunk::with_capacity(8);
        assert_eq!(reader.next_chunk(&mut chunk).unwrap(), 0);
        assert!(chunk.is_empty());
        assert_eq!(reader.next_chunk(&mut chunk).unwrap(), 0);
    }

    #[test]
    fn read_error_names_origin() {
        let mut reader = ChunkReader::with_origin(Failing, "broken");
        let mut chunk = Chunk::with_capacity(8);
        match reader.next_chunk(&mut chunk) {
            Err(Error::Io { path, .. }) => assert_eq!(path, std::path::Path::new("broken")),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ChunkReader::open(dir.path().join("missing"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }
}
