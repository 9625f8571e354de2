use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::caching::keys::{CachedKey, UrlListKey};
use crate::caching::{CacheKey, KeyCache};
use crate::pipeline::{CachingComponent, Consumer, Link, PipelineComponent, Producer, StageError};

use super::generator::file_url;
use super::{Downstream, TextEvent};

/// Lines of the form `@include <path>` are replaced by the named file.
pub const INCLUDE_DIRECTIVE: &str = "@include ";

/// Expands include directives relative to a base directory.
///
/// Which files get included is only known after a run, so the key fragment
/// goes through a [`KeyCache`]: the identity resolves to the list of files the
/// previous run included, re-stamped with their current modification times.
pub struct IncludeTransformer {
    identity: String,
    base_dir: PathBuf,
    keys: Arc<KeyCache>,
    included: Vec<Url>,
    downstream: Downstream,
}

impl IncludeTransformer {
    pub fn new(
        identity: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        keys: Arc<KeyCache>,
    ) -> Self {
        Self {
            identity: identity.into(),
            base_dir: base_dir.into(),
            keys,
            included: Vec::new(),
            downstream: Downstream::default(),
        }
    }

    fn resolve(&self, target: &str) -> PathBuf {
        let target = Path::new(target.trim());
        if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.base_dir.join(target)
        }
    }

    fn expand(&mut self, target: &str) -> Result<(), StageError> {
        let path = self.resolve(target);
        let text = fs::read_to_string(&path).map_err(|err| {
            StageError::failed(format!("cannot include `{}`: {err}", path.display()))
        })?;
        debug!(path = %path.display(), "Including file");

        match file_url(&path) {
            Some(url) => self.included.push(url),
            None => warn!(
                path = %path.display(),
                "Included file has no URL form, edits will not invalidate"
            ),
        }

        for line in text.lines() {
            self.downstream.emit(TextEvent::line(line))?;
        }
        Ok(())
    }
}

impl PipelineComponent<TextEvent> for IncludeTransformer {
    fn name(&self) -> &str {
        "include-transformer"
    }

    fn finish(&mut self) {
        let included = std::mem::take(&mut self.included);
        let resolved = UrlListKey::stat(included);
        debug!(identity = %self.identity, key = %resolved, "Recording included files");
        self.keys.record(&self.identity, resolved.into());
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

impl Consumer<TextEvent> for IncludeTransformer {
    fn consume(&mut self, event: TextEvent) -> Result<(), StageError> {
        match event {
            TextEvent::StartDocument => {
                self.included.clear();
                self.downstream.emit(TextEvent::StartDocument)
            }
            TextEvent::Line(line) => match line.strip_prefix(INCLUDE_DIRECTIVE) {
                Some(target) => self.expand(target),
                None => self.downstream.emit(TextEvent::Line(line)),
            },
            TextEvent::EndDocument => self.downstream.emit(TextEvent::EndDocument),
        }
    }
}

impl Producer<TextEvent> for IncludeTransformer {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.downstream.connect(next)
    }
}

impl CachingComponent for IncludeTransformer {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        let recorded = self.keys.key_for(&self.identity);
        // Re-stat so the fragment carries today's stamps, not the recorded ones.
        let current = match recorded.resolved() {
            CacheKey::UrlList(list) => UrlListKey::stat(list.urls().cloned()).into(),
            other => other.clone(),
        };
        Some(CachedKey::new(recorded.identity(), current).into())
    }
}
