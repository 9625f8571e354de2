use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};
use url::Url;

use crate::caching::keys::{ParameterKey, TimestampUrlKey};
use crate::caching::{CacheKey, LastModified, ResourceCache};
use crate::pipeline::{
    CachingComponent, Consumer, Link, Parameters, PipelineComponent, Producer, StageError,
};
use crate::util::modified::last_modified;

use super::generator::file_url;
use super::{Downstream, TextEvent};

/// Line of a template that marks where the document body goes.
pub const CONTENT_PLACEHOLDER: &str = "{{content}}";

/// A template split around its content line.
///
/// `{{NAME}}` anywhere in the prefix or suffix is replaced by the text
/// parameter `NAME`; placeholders without a matching parameter stay as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    prefix: Vec<String>,
    suffix: Vec<String>,
    placeholders: BTreeSet<String>,
}

impl CompiledTemplate {
    pub fn compile(source: &str) -> Self {
        let mut prefix = Vec::new();
        let mut suffix = Vec::new();
        let mut seen_content = false;

        for line in source.lines() {
            if !seen_content && line.trim() == CONTENT_PLACEHOLDER {
                seen_content = true;
            } else if seen_content {
                suffix.push(line.to_owned());
            } else {
                prefix.push(line.to_owned());
            }
        }

        let placeholders = prefix
            .iter()
            .chain(suffix.iter())
            .flat_map(|line| scan_placeholders(line))
            .collect();

        Self {
            prefix,
            suffix,
            placeholders,
        }
    }

    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn suffix(&self) -> &[String] {
        &self.suffix
    }

    /// Names of the parameters this template reads.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(String::as_str)
    }

    /// Substitute placeholders in one pass over `line`; inserted values are
    /// never scanned again.
    pub fn render_line(line: &str, values: &BTreeMap<String, String>) -> String {
        let mut rendered = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                break;
            };
            rendered.push_str(&rest[..start]);
            match values.get(after[..end].trim()) {
                Some(value) => rendered.push_str(value),
                None => rendered.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }
        rendered.push_str(rest);
        rendered
    }
}

fn scan_placeholders(line: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        if !name.is_empty() && name != "content" {
            names.push(name.to_owned());
        }
        rest = &after[end + 2..];
    }
    names
}

/// Wraps the document in a template read from disk.
///
/// Compiled templates are shared through a [`ResourceCache`] and recompiled
/// only when the file is newer than the compiled copy. The key fragment is the
/// template's stamped URL plus the parameter values the template reads.
pub struct TemplateTransformer {
    path: PathBuf,
    url: Option<Url>,
    resources: Arc<ResourceCache<Arc<CompiledTemplate>>>,
    template: Option<Arc<CompiledTemplate>>,
    values: BTreeMap<String, String>,
    downstream: Downstream,
}

impl TemplateTransformer {
    pub fn new(
        path: impl Into<PathBuf>,
        resources: Arc<ResourceCache<Arc<CompiledTemplate>>>,
    ) -> Self {
        let path = path.into();
        let url = file_url(&path);
        Self {
            path,
            url,
            resources,
            template: None,
            values: BTreeMap::new(),
            downstream: Downstream::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn identity(&self) -> String {
        match &self.url {
            Some(url) => url.to_string(),
            None => self.path.display().to_string(),
        }
    }

    fn load(&self) -> Result<Arc<CompiledTemplate>, StageError> {
        let id = self.identity();
        let current = self
            .url
            .as_ref()
            .map_or(LastModified::Unknown, last_modified);

        if let Some(template) = self.resources.get_fresh(&id, current) {
            trace!(template = %id, "Using compiled template");
            return Ok(template);
        }

        debug!(template = %id, modified = %current, "Compiling template");
        let source = fs::read_to_string(&self.path).map_err(|err| {
            StageError::failed(format!(
                "cannot read template `{}`: {err}",
                self.path.display()
            ))
        })?;
        let template = Arc::new(CompiledTemplate::compile(&source));
        self.resources.put(id, Arc::clone(&template), current);
        Ok(template)
    }

    fn emit_lines(&self, lines: &[String]) -> Result<(), StageError> {
        for line in lines {
            let rendered = CompiledTemplate::render_line(line, &self.values);
            self.downstream.emit(TextEvent::line(rendered))?;
        }
        Ok(())
    }
}

impl PipelineComponent<TextEvent> for TemplateTransformer {
    fn name(&self) -> &str {
        "template-transformer"
    }

    fn setup(&mut self, parameters: &mut Parameters) -> Result<(), StageError> {
        let template = self.load()?;
        self.values = template
            .placeholders()
            .filter_map(|name| {
                parameters
                    .text(name)
                    .map(|value| (name.to_owned(), value.to_owned()))
            })
            .collect();
        self.template = Some(template);
        Ok(())
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

impl Consumer<TextEvent> for TemplateTransformer {
    fn consume(&mut self, event: TextEvent) -> Result<(), StageError> {
        match event {
            TextEvent::StartDocument => {
                let template = self.load()?;
                self.downstream.emit(TextEvent::StartDocument)?;
                self.emit_lines(template.prefix())?;
                self.template = Some(template);
                Ok(())
            }
            TextEvent::EndDocument => {
                if let Some(template) = self.template.clone() {
                    self.emit_lines(template.suffix())?;
                }
                self.downstream.emit(TextEvent::EndDocument)
            }
            line => self.downstream.emit(line),
        }
    }
}

impl Producer<TextEvent> for TemplateTransformer {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.downstream.connect(next)
    }
}

impl CachingComponent for TemplateTransformer {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        let url = self.url.clone()?;
        let mut used = ParameterKey::new();
        for (name, value) in &self.values {
            used.insert(name.as_str(), value);
        }
        Some(CacheKey::compound([
            TimestampUrlKey::stat(url).into(),
            used.into(),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_splits_around_content_line() {
        let template = CompiledTemplate::compile("<{{title}}>\n{{content}}\n</{{title}}>\n");

        assert_eq!(template.prefix(), ["<{{title}}>"]);
        assert_eq!(template.suffix(), ["</{{title}}>"]);
        assert_eq!(template.placeholders().collect::<Vec<_>>(), ["title"]);
    }

    #[test]
    fn template_without_content_line_is_all_prefix() {
        let template = CompiledTemplate::compile("header\nfooter");

        assert_eq!(template.prefix().len(), 2);
        assert!(template.suffix().is_empty());
    }

    #[test]
    fn unknown_placeholders_stay_literal() {
        let values = BTreeMap::from([("lang".to_owned(), "en".to_owned())]);

        assert_eq!(
            CompiledTemplate::render_line("{{lang}}/{{region}}", &values),
            "en/{{region}}"
        );
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let values = BTreeMap::from([
            ("title".to_owned(), "{{user}}".to_owned()),
            ("user".to_owned(), "admin".to_owned()),
        ]);

        assert_eq!(
            CompiledTemplate::render_line("<{{title}}> by {{ user }}", &values),
            "<{{user}}> by admin"
        );
    }
}
