//! Write-through sink that keeps a copy of everything written.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};

use crate::caching::lock::lock;

use super::component::Sink;

const SOURCE: &str = "pipeline::sink";

struct Shared {
    inner: Sink,
    buffer: BytesMut,
}

/// Forwards every write to the wrapped sink immediately and buffers a copy.
///
/// Clones share the same sink and buffer, so one clone can be handed to a
/// finisher while the pipeline keeps another to read the captured output.
#[derive(Clone)]
pub struct CachingSink {
    shared: Arc<Mutex<Shared>>,
}

impl CachingSink {
    pub fn new(inner: Sink) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                inner,
                buffer: BytesMut::new(),
            })),
        }
    }

    /// A sink that only captures.
    pub fn detached() -> Self {
        Self::new(Box::new(io::sink()))
    }

    /// Take the captured bytes, leaving the buffer empty.
    pub fn take(&self) -> Bytes {
        lock(&self.shared, SOURCE, "take").buffer.split().freeze()
    }

    /// Drop whatever has been captured so far.
    pub fn reset(&self) {
        lock(&self.shared, SOURCE, "reset").buffer.clear();
    }

    pub fn captured_len(&self) -> usize {
        lock(&self.shared, SOURCE, "captured_len").buffer.len()
    }

    /// Run `f` against the wrapped sink, bypassing the capture buffer.
    pub fn with_inner<R>(&self, f: impl FnOnce(&mut dyn Write) -> R) -> R {
        let mut shared = lock(&self.shared, SOURCE, "with_inner");
        f(shared.inner.as_mut())
    }
}

impl Write for CachingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = lock(&self.shared, SOURCE, "write");
        let written = shared.inner.write(buf)?;
        shared.buffer.extend_from_slice(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.shared, SOURCE, "flush").inner.flush()
    }
}

impl std::fmt::Debug for CachingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingSink")
            .field("captured", &self.captured_len())
            .finish()
    }
}
