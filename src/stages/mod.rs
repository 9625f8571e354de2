//! Line-oriented text stages.
//!
//! Generators turn a source into [`TextEvent`]s, transformers rewrite them and
//! the serializer writes them out. Each stage contributes a cache key fragment
//! describing exactly the input it depends on.

mod generator;
mod include;
mod replace;
mod serializer;
mod template;

use std::sync::Arc;

use crate::pipeline::{Link, StageError};

pub use generator::{FileGenerator, StringGenerator};
pub use include::{INCLUDE_DIRECTIVE, IncludeTransformer};
pub use replace::ReplaceTransformer;
pub use serializer::TextSerializer;
pub use template::{CONTENT_PLACEHOLDER, CompiledTemplate, TemplateTransformer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEvent {
    StartDocument,
    Line(Arc<str>),
    EndDocument,
}

impl TextEvent {
    pub fn line(text: impl Into<Arc<str>>) -> Self {
        Self::Line(text.into())
    }
}

/// Connection to the next stage, filled in while linking.
#[derive(Debug, Default)]
pub(crate) struct Downstream {
    next: Option<Link<TextEvent>>,
}

impl Downstream {
    pub(crate) fn connect(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        if let Some(existing) = &self.next {
            return Err(StageError::failed(format!(
                "already linked to `{}`",
                existing.name()
            )));
        }
        self.next = Some(next);
        Ok(())
    }

    pub(crate) fn emit(&self, event: TextEvent) -> Result<(), StageError> {
        match &self.next {
            Some(next) => next.push(event),
            None => Err(StageError::failed("stage has no consumer")),
        }
    }

    /// Emit a whole document: start marker, every line, end marker.
    pub(crate) fn emit_document<'a, I>(&self, lines: I) -> Result<(), StageError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.emit(TextEvent::StartDocument)?;
        for line in lines {
            self.emit(TextEvent::line(line))?;
        }
        self.emit(TextEvent::EndDocument)
    }
}
