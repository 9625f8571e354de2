use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::caching::keys::TimestampUrlKey;
use crate::caching::{CacheKey, hash_value};
use crate::pipeline::{
    CachingComponent, Link, PipelineComponent, Producer, StageError, Starter,
};

use super::{Downstream, TextEvent};

/// Emits a fixed text, one event per line.
pub struct StringGenerator {
    text: String,
    downstream: Downstream,
}

impl StringGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            downstream: Downstream::default(),
        }
    }
}

impl PipelineComponent<TextEvent> for StringGenerator {
    fn name(&self) -> &str {
        "string-generator"
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

impl Starter for StringGenerator {
    fn execute(&mut self) -> Result<(), StageError> {
        self.downstream.emit_document(self.text.lines())
    }
}

impl Producer<TextEvent> for StringGenerator {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.downstream.connect(next)
    }
}

impl CachingComponent for StringGenerator {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::object(format!(
            "string:{:016x}",
            hash_value(self.text.as_str())
        )))
    }
}

/// Emits the lines of a local file.
///
/// Its key fragment is the file URL stamped with the file's modification time,
/// so edits to the file invalidate cached output.
pub struct FileGenerator {
    path: PathBuf,
    url: Option<Url>,
    downstream: Downstream,
}

impl FileGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let url = file_url(&path);
        Self {
            path,
            url,
            downstream: Downstream::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub(crate) fn file_url(path: &Path) -> Option<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Url::from_file_path(absolute).ok()
}

impl PipelineComponent<TextEvent> for FileGenerator {
    fn name(&self) -> &str {
        "file-generator"
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

impl Starter for FileGenerator {
    fn execute(&mut self) -> Result<(), StageError> {
        debug!(path = %self.path.display(), "Reading source file");
        let text = fs::read_to_string(&self.path)?;
        self.downstream.emit_document(text.lines())
    }
}

impl Producer<TextEvent> for FileGenerator {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.downstream.connect(next)
    }
}

impl CachingComponent for FileGenerator {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        let url = self.url.clone()?;
        Some(TimestampUrlKey::stat(url).into())
    }
}
