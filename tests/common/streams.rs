//! Readers that misbehave on purpose, for exercising the transfer pipeline.

#![allow(dead_code)]

use repofetch::service::RemoteStream;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Message of every error the readers here return.
pub const RESET_MESSAGE: &str = "connection reset mid-stream";

fn reset() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, RESET_MESSAGE)
}

/// Yields the first `limit` bytes of `inner`, then fails.
pub struct FailAfter {
    inner: RemoteStream,
    remaining: usize,
}

impl FailAfter {
    pub fn new(inner: RemoteStream, limit: usize) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }
}

impl Read for FailAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(reset());
        }
        let len = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..len])?;
        self.remaining -= n;
        Ok(n)
    }
}

/// Fails on first read, but only once every reader sharing the barrier
/// has started reading.
pub struct FailTogether {
    barrier: Arc<Barrier>,
}

impl FailTogether {
    pub fn new(barrier: Arc<Barrier>) -> Self {
        Self { barrier }
    }
}

impl Read for FailTogether {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.barrier.wait();
        Err(reset())
    }
}

/// Counts streams that are open at the same time.
#[derive(Default)]
pub struct OpenStreams {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl OpenStreams {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wrap `inner`; it counts as open until dropped. Each read is slowed
    /// down so concurrent transfers overlap.
    pub fn track(self: &Arc<Self>, inner: RemoteStream) -> RemoteStream {
        let open = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        Box::new(Tracked {
            inner,
            gauge: Arc::clone(self),
        })
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct Tracked {
    inner: RemoteStream,
    gauge: Arc<OpenStreams>,
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(Duration::from_millis(15));
        self.inner.read(buf)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}
