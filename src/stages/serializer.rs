use std::io::Write;

use crate::caching::CacheKey;
use crate::pipeline::{CachingComponent, Consumer, Finisher, PipelineComponent, Sink, StageError};

use super::TextEvent;

/// Writes each line followed by `\n` and flushes at the end of the document.
#[derive(Default)]
pub struct TextSerializer {
    output: Option<Sink>,
}

impl TextSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn output(&mut self) -> Result<&mut Sink, StageError> {
        self.output.as_mut().ok_or(StageError::NoOutput)
    }
}

impl PipelineComponent<TextEvent> for TextSerializer {
    fn name(&self) -> &str {
        "text-serializer"
    }

    fn as_consumer(&mut self) -> Option<&mut dyn Consumer<TextEvent>> {
        Some(self)
    }

    fn as_finisher(&mut self) -> Option<&mut dyn Finisher> {
        Some(self)
    }

    fn as_caching(&self) -> Option<&dyn CachingComponent> {
        Some(self)
    }
}

impl Consumer<TextEvent> for TextSerializer {
    fn consume(&mut self, event: TextEvent) -> Result<(), StageError> {
        match event {
            TextEvent::StartDocument => Ok(()),
            TextEvent::Line(line) => {
                let out = self.output()?;
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")?;
                Ok(())
            }
            TextEvent::EndDocument => Ok(self.output()?.flush()?),
        }
    }
}

impl Finisher for TextSerializer {
    fn content_type(&self) -> &str {
        "text/plain; charset=utf-8"
    }

    fn set_output(&mut self, sink: Sink) {
        self.output = Some(sink);
    }
}

impl CachingComponent for TextSerializer {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::Simple)
    }
}
