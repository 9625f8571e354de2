#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cachepipe::caching::CacheKey;
use cachepipe::caching::LastModified;
use cachepipe::caching::keys::TimestampSourceKey;
use cachepipe::pipeline::{
    CachingComponent, Consumer, Link, PipelineComponent, Producer, StageError, Starter,
};
use cachepipe::stages::TextEvent;

/// Cloneable in-memory sink.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("buffer lock")).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().expect("buffer lock").clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Observable state behind a [`VersionedSource`].
#[derive(Clone, Default)]
pub struct SourceTracker {
    pub version: Arc<AtomicI64>,
    pub runs: Arc<AtomicUsize>,
    /// While held by a test, runs block before emitting anything.
    pub gate: Arc<Mutex<()>>,
}

impl SourceTracker {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

/// Starter that emits `version <n>` and keys itself by that version.
pub struct VersionedSource {
    tracker: SourceTracker,
    next: Option<Link<TextEvent>>,
}

impl VersionedSource {
    pub fn new(tracker: &SourceTracker) -> Self {
        Self {
            tracker: tracker.clone(),
            next: None,
        }
    }

    fn emit(&self, event: TextEvent) -> Result<(), StageError> {
        match &self.next {
            Some(next) => next.push(event),
            None => Err(StageError::failed("not linked")),
        }
    }
}

impl PipelineComponent<TextEvent> for VersionedSource {
    fn name(&self) -> &str {
        "versioned-source"
    }

    fn as_starter(&mut self) -> Option<&mut dyn Starter> {
        Some(self)
    }

    fn as_producer(&mut self) -> Option<&mut dyn Producer<TextEvent>> {
        Some(self)
    }

    fn as_caching(&self) -> Option<&dyn CachingComponent> {
        Some(self)
    }
}

impl Starter for VersionedSource {
    fn execute(&mut self) -> Result<(), StageError> {
        drop(self.tracker.gate.lock().expect("gate lock"));
        self.tracker.runs.fetch_add(1, Ordering::SeqCst);
        let version = self.tracker.version.load(Ordering::SeqCst);

        self.emit(TextEvent::StartDocument)?;
        self.emit(TextEvent::line(format!("version {version}")))?;
        self.emit(TextEvent::EndDocument)
    }
}

impl Producer<TextEvent> for VersionedSource {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.next = Some(next);
        Ok(())
    }
}

impl CachingComponent for VersionedSource {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        let version = self.tracker.version.load(Ordering::SeqCst);
        Some(TimestampSourceKey::new("versioned", LastModified::from_millis(version)).into())
    }
}

/// Pass-through stage that cannot describe its output with a key.
#[derive(Default)]
pub struct Opaque {
    next: Option<Link<TextEvent>>,
}

impl PipelineComponent<TextEvent> for Opaque {
    fn name(&self) -> &str {
        "opaque"
    }

    fn as_consumer(&mut self) -> Option<&mut dyn Consumer<TextEvent>> {
        Some(self)
    }

    fn as_producer(&mut self) -> Option<&mut dyn Producer<TextEvent>> {
        Some(self)
    }
}

impl Consumer<TextEvent> for Opaque {
    fn consume(&mut self, event: TextEvent) -> Result<(), StageError> {
        match &self.next {
            Some(next) => next.push(event),
            None => Err(StageError::failed("not linked")),
        }
    }
}

impl Producer<TextEvent> for Opaque {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.next = Some(next);
        Ok(())
    }
}

/// Pass-through stage that fails every run while `failing` is set.
pub struct Flaky {
    pub failing: Arc<std::sync::atomic::AtomicBool>,
    next: Option<Link<TextEvent>>,
}

impl Flaky {
    pub fn new(failing: &Arc<std::sync::atomic::AtomicBool>) -> Self {
        Self {
            failing: Arc::clone(failing),
            next: None,
        }
    }
}

impl PipelineComponent<TextEvent> for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn as_consumer(&mut self) -> Option<&mut dyn Consumer<TextEvent>> {
        Some(self)
    }

    fn as_producer(&mut self) -> Option<&mut dyn Producer<TextEvent>> {
        Some(self)
    }

    fn as_caching(&self) -> Option<&dyn CachingComponent> {
        Some(self)
    }
}

impl Consumer<TextEvent> for Flaky {
    fn consume(&mut self, event: TextEvent) -> Result<(), StageError> {
        if self.failing.load(Ordering::SeqCst) && matches!(event, TextEvent::EndDocument) {
            return Err(StageError::failed("flaky stage gave up"));
        }
        match &self.next {
            Some(next) => next.push(event),
            None => Err(StageError::failed("not linked")),
        }
    }
}

impl Producer<TextEvent> for Flaky {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.next = Some(next);
        Ok(())
    }
}

impl CachingComponent for Flaky {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::Simple)
    }
}
