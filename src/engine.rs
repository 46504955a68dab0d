//! Deciding whether two files hold the same bytes.
//!
//! A comparison moves through four stages:
//!
//! 1. Both sizes are read from metadata. Different sizes are `NotEqual`
//!    and two empty files are `Equal`, without opening either file.
//! 2. Paths that are equal ignoring ASCII case are `Equal` without reading.
//!    This is a cheap proxy for "same file", not an identity check: hard
//!    links, symlinks and case-sensitive file systems can defeat it, so
//!    callers that care should pass canonical paths.
//! 3. [`select`] fixes the kernel and chunk size for the whole comparison.
//! 4. Chunk pairs at the same offset are pulled from both files and handed to
//!    the kernel. The first unequal pair ends the comparison.
//!
//! Every exit path, including errors and cancellation, drops both readers
//! and so closes both files.

use crate::bits::first_difference;
use crate::concurrent::PairedReader;
use crate::error::{Error, Result};
use crate::hashed::{self, Digest};
use crate::mapped::MappedFile;
use crate::reader::{Chunk, ChunkReader};
use crate::selector::{select, Capabilities, KernelKind, Plan, Strategy};
use crate::DynamicKernel;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{self, Path};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const LEFT_HANDLE: &str = "<left handle>";
const RIGHT_HANDLE: &str = "<right handle>";

/// How file contents are brought into memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Read chunk A, then chunk B, on the calling thread.
    #[default]
    Sequential,
    /// Read chunk A and chunk B at the same time on two threads, then
    /// compare. Only I/O overlaps; comparison stays on the calling thread.
    Concurrent,
    /// Map both files into memory and compare chunk-sized windows.
    Mapped,
}

/// Lets a caller abandon a comparison running on another thread.
///
/// The flag is checked before every chunk pair. A cancelled comparison
/// returns [`Error::Cancelled`] and still closes both files.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every comparison holding a clone of this
    /// token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Engine configuration.
#[derive(Clone, Debug, Default)]
pub struct Options {
    strategy: Strategy,
    chunk_size: Option<usize>,
    read_mode: ReadMode,
    cancel: Option<CancelToken>,
}

impl Options {
    /// Kernel preference. Defaults to [`Strategy::Auto`].
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Fixed chunk size, rounded up to a multiple of
    /// [`STRIDE_ALIGN`](crate::selector::STRIDE_ALIGN) and capped at the file
    /// length rounded the same way. By default the selector sizes chunks
    /// from the file length.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Defaults to [`ReadMode::Sequential`].
    pub fn read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    /// Token checked before every chunk pair.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of comparing two files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Same length, same bytes.
    Equal,
    /// Anything else.
    NotEqual,
}

impl Verdict {
    /// Returns `true` for [`Verdict::Equal`].
    pub fn is_equal(self) -> bool {
        self == Verdict::Equal
    }
}

impl From<bool> for Verdict {
    fn from(equal: bool) -> Self {
        if equal {
            Verdict::Equal
        } else {
            Verdict::NotEqual
        }
    }
}

/// Why a verdict was reached. For diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    /// Metadata sizes differ.
    SizeMismatch {
        /// Size of the left file.
        left: u64,
        /// Size of the right file.
        right: u64,
    },
    /// Both files are empty.
    BothEmpty,
    /// Both paths name the same file, ignoring ASCII case.
    SamePath,
    /// First differing byte.
    ContentMismatch {
        /// Byte offset from the start of the files.
        offset: u64,
    },
    /// One file ended before the other although their sizes matched when
    /// the comparison started.
    LengthChanged {
        /// Offset of the chunk pair where the lengths diverged.
        offset: u64,
    },
    /// Full-file digests differ.
    DigestMismatch,
    /// Every byte compared equal.
    Identical,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::SizeMismatch { left, right } => write!(f, "sizes differ ({left} vs {right} bytes)"),
            Reason::BothEmpty => f.write_str("both files are empty"),
            Reason::SamePath => f.write_str("same path"),
            Reason::ContentMismatch { offset } => write!(f, "first difference at byte {offset}"),
            Reason::LengthChanged { offset } => write!(f, "lengths diverged at byte {offset}"),
            Reason::DigestMismatch => f.write_str("digests differ"),
            Reason::Identical => f.write_str("identical"),
        }
    }
}

/// Read-count instrumentation for one comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Non-empty chunk reads across both files. In mapped mode, chunk
    /// windows handed to the kernel.
    pub reads: u64,
    /// Bytes read across both files.
    pub bytes: u64,
}

impl Stats {
    #[inline]
    pub(crate) fn record(&mut self, read: usize) {
        if read > 0 {
            self.reads += 1;
            self.bytes += read as u64;
        }
    }
}

/// Verdict plus what it took to reach it.
#[derive(Clone, Debug)]
pub struct Outcome {
    verdict: Verdict,
    reason: Reason,
    plan: Option<Plan>,
    stats: Stats,
    digests: Option<(Digest, Digest)>,
}

impl Outcome {
    fn shortcut(verdict: Verdict, reason: Reason) -> Self {
        Self {
            verdict,
            reason,
            plan: None,
            stats: Stats::default(),
            digests: None,
        }
    }

    /// The verdict.
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Returns `true` if the files are equal.
    pub fn is_equal(&self) -> bool {
        self.verdict.is_equal()
    }

    /// Why the verdict was reached.
    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// Kernel and chunk size used, or `None` if metadata decided.
    pub fn plan(&self) -> Option<Plan> {
        self.plan
    }

    /// Reads performed.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Left and right digests, when the hashed strategy ran.
    pub fn digests(&self) -> Option<(Digest, Digest)> {
        self.digests
    }
}

/// Paired walk over both files, shared by every chunked read mode.
struct Walk<'a> {
    kernel: DynamicKernel,
    plan: Plan,
    len: u64,
    offset: u64,
    stats: Stats,
    cancel: Option<&'a CancelToken>,
}

impl<'a> Walk<'a> {
    fn new(plan: Plan, len: u64, cancel: Option<&'a CancelToken>) -> Self {
        let kernel = DynamicKernel::for_kind(plan.kernel);
        Self {
            plan: Plan {
                kernel: kernel.kind(),
                ..plan
            },
            kernel,
            len,
            offset: 0,
            stats: Stats::default(),
            cancel,
        }
    }

    /// Returns `true` while bytes remain, failing if cancelled.
    fn pending(&self) -> Result<bool> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        Ok(self.offset < self.len)
    }

    /// Compares one chunk pair. `Some` ends the walk.
    fn step(&mut self, left: &[u8], right: &[u8], origin: &Path) -> Result<Option<Outcome>> {
        self.stats.record(left.len());
        self.stats.record(right.len());

        if left.len() != right.len() {
            return Ok(Some(self.finish(
                Verdict::NotEqual,
                Reason::LengthChanged {
                    offset: self.offset,
                },
            )));
        }
        if left.is_empty() {
            return Err(Error::truncated(origin, self.len, self.offset));
        }

        log::trace!("Comparing {} bytes at offset {}", left.len(), self.offset);
        if !self.kernel.inlined_equal(left, right) {
            let at = first_difference(left, right).unwrap_or(0) as u64;
            return Ok(Some(self.finish(
                Verdict::NotEqual,
                Reason::ContentMismatch {
                    offset: self.offset + at,
                },
            )));
        }

        self.offset += left.len() as u64;
        Ok(None)
    }

    fn finish(&self, verdict: Verdict, reason: Reason) -> Outcome {
        Outcome {
            verdict,
            reason,
            plan: Some(self.plan),
            stats: self.stats,
            digests: None,
        }
    }
}

/// Compares files according to its [`Options`].
///
/// An engine holds no per-comparison state, so one engine can serve any
/// number of comparisons, including from several threads at once.
#[derive(Clone, Debug)]
pub struct Engine {
    options: Options,
    capabilities: Capabilities,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with default options for the running CPU.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Engine with `options` for the running CPU.
    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            capabilities: Capabilities::detect(),
        }
    }

    /// Replaces the detected CPU capabilities the selector sees.
    ///
    /// Claiming an instruction set the CPU lacks still ends up running the
    /// scalar kernel.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Current options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Compares the files at `left` and `right`.
    pub fn compare(&self, left: impl AsRef<Path>, right: impl AsRef<Path>) -> Result<Outcome> {
        let (left, right) = (left.as_ref(), right.as_ref());
        let left_len = file_len(left)?;
        let right_len = file_len(right)?;

        if let Some(outcome) = metadata_verdict(left_len, right_len) {
            return Ok(outcome);
        }
        if same_path(left, right) {
            log::debug!("{:?} and {:?} are the same path", left, right);
            return Ok(Outcome::shortcut(Verdict::Equal, Reason::SamePath));
        }

        let plan = self.plan(left_len);
        log::debug!(
            "Comparing {:?} and {:?} ({} bytes) with {} kernel, {} byte chunks, {:?} reads",
            left,
            right,
            left_len,
            plan.kernel,
            plan.chunk_size,
            self.options.read_mode
        );

        let outcome = match self.options.read_mode {
            ReadMode::Mapped => {
                let left = MappedFile::open(left)?;
                let right = MappedFile::open(right)?;
                self.compare_mapped(&left, &right, plan)?
            }
            ReadMode::Sequential | ReadMode::Concurrent => {
                let left = ChunkReader::open(left)?;
                let right = ChunkReader::open(right)?;
                self.compare_streams(left, right, left_len, plan)?
            }
        };
        log::debug!("{:?}: {}", outcome.verdict, outcome.reason);
        Ok(outcome)
    }

    /// Compares two already-open files.
    ///
    /// Sizes come from the handles' metadata. There is no path to compare,
    /// so the same-path shortcut never applies.
    pub fn compare_files(&self, left: File, right: File) -> Result<Outcome> {
        let left_len = handle_len(&left, LEFT_HANDLE)?;
        let right_len = handle_len(&right, RIGHT_HANDLE)?;

        if let Some(outcome) = metadata_verdict(left_len, right_len) {
            return Ok(outcome);
        }

        let plan = self.plan(left_len);
        let outcome = match self.options.read_mode {
            ReadMode::Mapped => {
                let left = MappedFile::from_file(&left, LEFT_HANDLE)?;
                let right = MappedFile::from_file(&right, RIGHT_HANDLE)?;
                self.compare_mapped(&left, &right, plan)?
            }
            ReadMode::Sequential | ReadMode::Concurrent => self.compare_streams(
                ChunkReader::with_origin(left, LEFT_HANDLE),
                ChunkReader::with_origin(right, RIGHT_HANDLE),
                left_len,
                plan,
            )?,
        };
        log::debug!("{:?}: {}", outcome.verdict, outcome.reason);
        Ok(outcome)
    }

    fn plan(&self, len: u64) -> Plan {
        select(
            len,
            self.capabilities,
            self.options.strategy,
            self.options.chunk_size,
        )
    }

    fn cancel(&self) -> Option<&CancelToken> {
        self.options.cancel.as_ref()
    }

    /// Compares two streams expected to hold `len` bytes each.
    pub(crate) fn compare_streams<R: Read + Send>(
        &self,
        left: ChunkReader<R>,
        right: ChunkReader<R>,
        len: u64,
        plan: Plan,
    ) -> Result<Outcome> {
        match (plan.kernel, self.options.read_mode) {
            (KernelKind::Hashed, ReadMode::Concurrent) => self.digest_concurrent(left, right, plan),
            (KernelKind::Hashed, _) => self.digest_sequential(left, right, plan),
            (_, ReadMode::Concurrent) => self.chunks_concurrent(left, right, len, plan),
            (_, _) => self.chunks_sequential(left, right, len, plan),
        }
    }

    fn chunks_sequential<R: Read>(
        &self,
        mut left: ChunkReader<R>,
        mut right: ChunkReader<R>,
        len: u64,
        plan: Plan,
    ) -> Result<Outcome> {
        let mut walk = Walk::new(plan, len, self.cancel());
        let mut left_chunk = Chunk::with_capacity(plan.chunk_size);
        let mut right_chunk = Chunk::with_capacity(plan.chunk_size);

        while walk.pending()? {
            left.next_chunk(&mut left_chunk)?;
            right.next_chunk(&mut right_chunk)?;
            if let Some(outcome) = walk.step(left_chunk.as_slice(), right_chunk.as_slice(), left.origin())? {
                return Ok(outcome);
            }
        }

        Ok(walk.finish(Verdict::Equal, Reason::Identical))
    }

    fn chunks_concurrent<R: Read + Send>(
        &self,
        left: ChunkReader<R>,
        right: ChunkReader<R>,
        len: u64,
        plan: Plan,
    ) -> Result<Outcome> {
        let mut walk = Walk::new(plan, len, self.cancel());

        thread::scope(|scope| -> Result<Outcome> {
            let pair = PairedReader::spawn(scope, left, right);
            let mut left_chunk = Chunk::with_capacity(plan.chunk_size);
            let mut right_chunk = Chunk::with_capacity(plan.chunk_size);

            while walk.pending()? {
                (left_chunk, right_chunk) = pair.read_pair(left_chunk, right_chunk)?;
                if let Some(outcome) = walk.step(left_chunk.as_slice(), right_chunk.as_slice(), pair.left_origin())? {
                    return Ok(outcome);
                }
            }

            Ok(walk.finish(Verdict::Equal, Reason::Identical))
        })
    }

    fn digest_sequential<R: Read>(
        &self,
        mut left: ChunkReader<R>,
        mut right: ChunkReader<R>,
        plan: Plan,
    ) -> Result<Outcome> {
        let mut chunk = Chunk::with_capacity(plan.chunk_size);
        let mut stats = Stats::default();
        let left_digest = hashed::digest_cancellable(&mut left, &mut chunk, &mut stats, self.cancel())?;
        drop(left);
        let right_digest = hashed::digest_cancellable(&mut right, &mut chunk, &mut stats, self.cancel())?;

        Ok(digest_outcome(plan, stats, left_digest, right_digest))
    }

    fn digest_concurrent<R: Read + Send>(
        &self,
        mut left: ChunkReader<R>,
        mut right: ChunkReader<R>,
        plan: Plan,
    ) -> Result<Outcome> {
        let cancel = self.cancel();
        let right_origin = right.origin().to_path_buf();

        thread::scope(|scope| -> Result<Outcome> {
            let right_task = scope.spawn(move || {
                let mut chunk = Chunk::with_capacity(plan.chunk_size);
                let mut stats = Stats::default();
                hashed::digest_cancellable(&mut right, &mut chunk, &mut stats, cancel).map(|digest| (digest, stats))
            });

            let mut chunk = Chunk::with_capacity(plan.chunk_size);
            let mut stats = Stats::default();
            let left_digest = hashed::digest_cancellable(&mut left, &mut chunk, &mut stats, cancel);

            let (right_digest, right_stats) = right_task
                .join()
                .map_err(|_| Error::worker_gone(&right_origin))??;
            let left_digest = left_digest?;

            stats.reads += right_stats.reads;
            stats.bytes += right_stats.bytes;
            Ok(digest_outcome(plan, stats, left_digest, right_digest))
        })
    }

    fn compare_mapped(&self, left: &MappedFile, right: &MappedFile, plan: Plan) -> Result<Outcome> {
        let (left_bytes, right_bytes) = (left.as_slice(), right.as_slice());

        if plan.kernel == KernelKind::Hashed {
            let mut stats = Stats::default();
            log::debug!("Computing BLAKE3 hash for file: {:?}", left.origin());
            let left_digest = hashed::digest_windows(left_bytes, plan.chunk_size, &mut stats, self.cancel())?;
            log::debug!("Computing BLAKE3 hash for file: {:?}", right.origin());
            let right_digest = hashed::digest_windows(right_bytes, plan.chunk_size, &mut stats, self.cancel())?;
            return Ok(digest_outcome(plan, stats, left_digest, right_digest));
        }

        let len = left_bytes.len().min(right_bytes.len());
        let mut walk = Walk::new(plan, len as u64, self.cancel());
        if left_bytes.len() != right_bytes.len() {
            // Sizes matched in metadata but not once mapped.
            return Ok(walk.finish(Verdict::NotEqual, Reason::LengthChanged { offset: 0 }));
        }

        while walk.pending()? {
            let start = walk.offset as usize;
            let end = (start + plan.chunk_size).min(len);
            if let Some(outcome) = walk.step(&left_bytes[start..end], &right_bytes[start..end], left.origin())? {
                return Ok(outcome);
            }
        }

        Ok(walk.finish(Verdict::Equal, Reason::Identical))
    }
}

fn digest_outcome(plan: Plan, stats: Stats, left: Digest, right: Digest) -> Outcome {
    let (verdict, reason) = if left == right {
        (Verdict::Equal, Reason::Identical)
    } else {
        (Verdict::NotEqual, Reason::DigestMismatch)
    };
    Outcome {
        verdict,
        reason,
        plan: Some(plan),
        stats,
        digests: Some((left, right)),
    }
}

fn metadata_verdict(left_len: u64, right_len: u64) -> Option<Outcome> {
    if left_len != right_len {
        log::debug!("Sizes differ: {} vs {} bytes", left_len, right_len);
        return Some(Outcome::shortcut(
            Verdict::NotEqual,
            Reason::SizeMismatch {
                left: left_len,
                right: right_len,
            },
        ));
    }
    if left_len == 0 {
        return Some(Outcome::shortcut(Verdict::Equal, Reason::BothEmpty));
    }
    None
}

fn file_len(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    if !metadata.is_file() {
        return Err(Error::NotAFile {
            path: path.to_path_buf(),
        });
    }
    Ok(metadata.len())
}

fn handle_len(file: &File, origin: &str) -> Result<u64> {
    let metadata = file.metadata().map_err(|e| Error::io(origin, e))?;
    if !metadata.is_file() {
        return Err(Error::NotAFile { path: origin.into() });
    }
    Ok(metadata.len())
}

fn same_path(left: &Path, right: &Path) -> bool {
    let left = path::absolute(left).unwrap_or_else(|_| left.to_path_buf());
    let right = path::absolute(right).unwrap_or_else(|_| right.to_path_buf());
    left.as_os_str().eq_ignore_ascii_case(right.as_os_str())
}

/// Returns `true` if the files at `left` and `right` hold the same bytes,
/// using default options.
pub fn files_equal(left: impl AsRef<Path>, right: impl AsRef<Path>) -> Result<bool> {
    Engine::new().compare(left, right).map(|outcome| outcome.is_equal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::Trickle;
    use crate::selector::STRIDE_ALIGN;
    use std::sync::atomic::AtomicUsize;

    fn plan(kernel: KernelKind, chunk_size: usize) -> Plan {
        Plan { kernel, chunk_size }
    }

    fn streams<'a>(left: &'a [u8], right: &'a [u8]) -> (ChunkReader<&'a [u8]>, ChunkReader<&'a [u8]>) {
        (
            ChunkReader::with_origin(left, "left"),
            ChunkReader::with_origin(right, "right"),
        )
    }

    #[test]
    fn short_reads_do_not_cause_false_mismatch() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 13) as u8).collect();
        for mode in [ReadMode::Sequential, ReadMode::Concurrent] {
            let engine = Engine::with_options(Options::default().read_mode(mode));
            let left = ChunkReader::with_origin(
                Trickle {
                    data: &data,
                    step: 5,
                    interrupt: false,
                },
                "left",
            );
            let right = ChunkReader::with_origin(
                Trickle {
                    data: &data,
                    step: 17,
                    interrupt: true,
                },
                "right",
            );
            let outcome = engine
                .compare_streams(left, right, 1000, plan(KernelKind::Scalar, 384))
                .unwrap();
            assert_eq!(outcome.verdict(), Verdict::Equal);
            assert_eq!(outcome.stats().reads, 6);
        }
    }

    #[test]
    fn one_side_shorter_than_expected() {
        let left = vec![7u8; 100];
        let right = vec![7u8; 80];
        let (l, r) = streams(&left, &right);
        let outcome = Engine::new()
            .compare_streams(l, r, 100, plan(KernelKind::Scalar, 64))
            .unwrap();
        assert_eq!(outcome.verdict(), Verdict::NotEqual);
        assert_eq!(outcome.reason(), Reason::LengthChanged { offset: 64 });
    }

    #[test]
    fn both_sides_truncated() {
        let data = vec![7u8; 60];
        let (l, r) = streams(&data, &data);
        let result = Engine::new().compare_streams(l, r, 100, plan(KernelKind::Scalar, 64));
        match result {
            Err(Error::Io { source, .. }) => assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result {:?}", other.map(|o| o.verdict())),
        }
    }

    #[test]
    fn mismatch_offset_reported() {
        let left = vec![0u8; 1000];
        let mut right = left.clone();
        right[700] = 1;
        let (l, r) = streams(&left, &right);
        let outcome = Engine::new()
            .compare_streams(l, r, 1000, plan(KernelKind::Scalar, 256))
            .unwrap();
        assert_eq!(outcome.reason(), Reason::ContentMismatch { offset: 700 });
        assert_eq!(outcome.stats().reads, 6);
    }

    #[test]
    fn cancelled_before_first_chunk() {
        let token = CancelToken::new();
        token.cancel();
        let data = vec![1u8; 100];
        for mode in [ReadMode::Sequential, ReadMode::Concurrent] {
            for kernel in [KernelKind::Scalar, KernelKind::Hashed] {
                let engine = Engine::with_options(
                    Options::default().read_mode(mode).cancel_token(token.clone()),
                );
                let (l, r) = streams(&data, &data);
                let result = engine.compare_streams(l, r, 100, plan(kernel, STRIDE_ALIGN));
                assert!(matches!(result, Err(Error::Cancelled)), "{mode:?} {kernel:?}");
            }
        }
    }

    /// Counts reads and drops, and cancels `token` on its first read when
    /// asked to.
    struct Watched<'a> {
        data: &'a [u8],
        cancel: Option<CancelToken>,
        reads: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    impl Read for Watched<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = self.cancel.take() {
                token.cancel();
            }
            self.data.read(buf)
        }
    }

    impl Drop for Watched<'_> {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancelled_between_chunks() {
        let data = vec![3u8; 1000];
        for mode in [ReadMode::Sequential, ReadMode::Concurrent] {
            for kernel in [KernelKind::Scalar, KernelKind::Hashed] {
                let token = CancelToken::new();
                let reads = Arc::new(AtomicUsize::new(0));
                let drops = Arc::new(AtomicUsize::new(0));
                let watched = |cancel| Watched {
                    data: &data,
                    cancel,
                    reads: Arc::clone(&reads),
                    drops: Arc::clone(&drops),
                };
                let left = ChunkReader::with_origin(watched(Some(token.clone())), "left");
                let right = ChunkReader::with_origin(watched(None), "right");

                let engine = Engine::with_options(
                    Options::default().read_mode(mode).cancel_token(token.clone()),
                );
                let result = engine.compare_streams(left, right, 1000, plan(kernel, 128));

                assert!(matches!(result, Err(Error::Cancelled)), "{mode:?} {kernel:?}");
                assert!(reads.load(Ordering::SeqCst) > 0, "{mode:?} {kernel:?}");
                // 1000 bytes in 128-byte chunks would take 8 reads per side.
                assert!(reads.load(Ordering::SeqCst) < 16, "{mode:?} {kernel:?}");
                assert_eq!(drops.load(Ordering::SeqCst), 2, "{mode:?} {kernel:?}");
            }
        }
    }

    #[test]
    fn digests_returned() {
        let left = b"Lorem ipsum dolor sit amet".to_vec();
        let mut right = left.clone();
        right[0] = b'l';
        for mode in [ReadMode::Sequential, ReadMode::Concurrent] {
            let engine = Engine::with_options(Options::default().read_mode(mode));
            let (l, r) = streams(&left, &right);
            let outcome = engine
                .compare_streams(l, r, left.len() as u64, plan(KernelKind::Hashed, 32))
                .unwrap();
            assert_eq!(outcome.reason(), Reason::DigestMismatch);
            let (left_digest, right_digest) = outcome.digests().unwrap();
            assert_eq!(left_digest, hashed::digest_bytes(&left));
            assert_eq!(right_digest, hashed::digest_bytes(&right));
            assert_eq!(outcome.stats().bytes, 2 * left.len() as u64);
        }
    }

    #[test]
    fn metadata_shortcuts() {
        assert_eq!(metadata_verdict(0, 0).map(|o| o.reason()), Some(Reason::BothEmpty));
        assert_eq!(
            metadata_verdict(0, 1).map(|o| o.reason()),
            Some(Reason::SizeMismatch { left: 0, right: 1 })
        );
        assert!(metadata_verdict(5, 5).is_none());
    }

    #[test]
    fn same_path_ignores_ascii_case() {
        assert!(same_path(Path::new("/tmp/Foo.BIN"), Path::new("/tmp/foo.bin")));
        assert!(same_path(Path::new("foo.bin"), Path::new("FOO.bin")));
        assert!(!same_path(Path::new("/tmp/foo.bin"), Path::new("/tmp/foo.bim")));
    }

    #[test]
    fn verdict_from_bool() {
        assert_eq!(Verdict::from(true), Verdict::Equal);
        assert!(!Verdict::from(false).is_equal());
    }
}
