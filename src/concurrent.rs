//! Reading the two sides of a comparison on two threads.
//!
//! Each file gets a worker thread owning its [`ChunkReader`]. The engine
//! hands both workers an empty chunk, and both reads run at the same time;
//! the engine only compares once both chunks are back. There is no
//! read-ahead, so a mismatch still means no later chunk is ever read.

use crate::error::{Error, Result};
use crate::reader::{Chunk, ChunkReader};
use crossbeam_channel::{Receiver, Select, SelectedOperation, Sender};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread::Scope;

type Reply = (Chunk, Result<usize>);

struct Worker {
    requests: Sender<Chunk>,
    replies: Receiver<Reply>,
    origin: PathBuf,
}

impl Worker {
    fn spawn<'scope, 'env, R>(scope: &'scope Scope<'scope, 'env>, mut reader: ChunkReader<R>) -> Self
    where
        R: Read + Send + 'scope,
    {
        let origin = reader.origin().to_path_buf();
        let (requests, request_rx) = crossbeam_channel::bounded::<Chunk>(1);
        let (reply_tx, replies) = crossbeam_channel::bounded::<Reply>(1);

        scope.spawn(move || {
            for mut chunk in request_rx {
                let read = reader.next_chunk(&mut chunk);
                if reply_tx.send((chunk, read)).is_err() {
                    break;
                }
            }
            // Dropping `reader` here closes the file.
            log::trace!("Reader thread for {:?} done at {}", reader.origin(), reader.position());
        });

        Worker {
            requests,
            replies,
            origin,
        }
    }

    fn request(&self, chunk: Chunk) -> Result<()> {
        self.requests
            .send(chunk)
            .map_err(|_| Error::worker_gone(&self.origin))
    }

    fn receive(&self, op: SelectedOperation<'_>) -> Result<Chunk> {
        let (chunk, read) = op
            .recv(&self.replies)
            .map_err(|_| Error::worker_gone(&self.origin))?;
        read?;
        Ok(chunk)
    }
}

/// Two reader threads driven in lockstep.
///
/// Dropping it disconnects both workers, which then exit and release their
/// files; the enclosing scope joins them.
pub(crate) struct PairedReader {
    left: Worker,
    right: Worker,
}

impl PairedReader {
    pub(crate) fn spawn<'scope, 'env, R>(
        scope: &'scope Scope<'scope, 'env>,
        left: ChunkReader<R>,
        right: ChunkReader<R>,
    ) -> Self
    where
        R: Read + Send + 'scope,
    {
        Self {
            left: Worker::spawn(scope, left),
            right: Worker::spawn(scope, right),
        }
    }

    pub(crate) fn left_origin(&self) -> &Path {
        &self.left.origin
    }

    /// Fills both chunks in parallel and waits for both.
    ///
    /// If either read fails the error is returned as soon as it arrives,
    /// without comparing anything.
    pub(crate) fn read_pair(&self, left: Chunk, right: Chunk) -> Result<(Chunk, Chunk)> {
        self.left.request(left)?;
        self.right.request(right)?;

        let mut left = None;
        let mut right = None;
        while left.is_none() || right.is_none() {
            let mut sel = Select::new();
            let left_index = left.is_none().then(|| sel.recv(&self.left.replies));
            if right.is_none() {
                sel.recv(&self.right.replies);
            }
            let op = sel.select();
            if Some(op.index()) == left_index {
                left = Some(self.left.receive(op)?);
            } else {
                right = Some(self.right.receive(op)?);
            }
        }

        left.zip(right).ok_or_else(|| Error::worker_gone(&self.left.origin))
    }
}
