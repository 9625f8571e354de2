use crate::caching::CacheKey;
use crate::caching::keys::ParameterKey;
use crate::pipeline::{
    CachingComponent, Configuration, Consumer, Link, PipelineComponent, Producer, StageError,
};

use super::{Downstream, TextEvent};

pub const REPLACE_FROM: &str = "replace.from";
pub const REPLACE_TO: &str = "replace.to";

/// Replaces every occurrence of a literal pattern in each line.
pub struct ReplaceTransformer {
    from: String,
    to: String,
    downstream: Downstream,
}

impl ReplaceTransformer {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            downstream: Downstream::default(),
        }
    }
}

impl PipelineComponent<TextEvent> for ReplaceTransformer {
    fn name(&self) -> &str {
        "replace-transformer"
    }

    fn configure(&mut self, config: &Configuration) {
        if let Some(from) = config.get(REPLACE_FROM) {
            self.from.clone_from(from);
        }
        if let Some(to) = config.get(REPLACE_TO) {
            self.to.clone_from(to);
        }
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

impl Consumer<TextEvent> for ReplaceTransformer {
    fn consume(&mut self, event: TextEvent) -> Result<(), StageError> {
        match event {
            TextEvent::Line(line) if !self.from.is_empty() && line.contains(&self.from) => {
                let replaced = line.replace(&self.from, &self.to);
                self.downstream.emit(TextEvent::line(replaced))
            }
            other => self.downstream.emit(other),
        }
    }
}

impl Producer<TextEvent> for ReplaceTransformer {
    fn set_consumer(&mut self, next: Link<TextEvent>) -> Result<(), StageError> {
        self.downstream.connect(next)
    }
}

impl CachingComponent for ReplaceTransformer {
    fn construct_cache_key(&self) -> Option<CacheKey> {
        Some(
            ParameterKey::new()
                .with("from", &self.from)
                .with("to", &self.to)
                .into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::pipeline::sink::tests::SharedBuffer;
    use crate::pipeline::{Parameters, Pipeline};
    use crate::stages::{StringGenerator, TextSerializer};

    use super::*;

    fn render(text: &str, replacer: ReplaceTransformer) -> String {
        let out = SharedBuffer::default();
        let mut pipeline = Pipeline::new();
        pipeline.add_component(StringGenerator::new(text)).expect("add");
        pipeline.add_component(replacer).expect("add");
        pipeline.add_component(TextSerializer::new()).expect("add");
        pipeline
            .setup(Box::new(out.clone()), &mut Parameters::new())
            .expect("setup");
        pipeline.execute().expect("execute");
        out.contents()
    }

    #[test]
    fn replaces_every_occurrence() {
        let output = render("a-a\nb", ReplaceTransformer::new("a", "z"));
        assert_eq!(output, "z-z\nb\n");
    }

    #[test]
    fn empty_pattern_passes_lines_through() {
        let output = render("unchanged", ReplaceTransformer::new("", "x"));
        assert_eq!(output, "unchanged\n");
    }

    #[test]
    fn configuration_overrides_pattern_and_key() {
        let mut replacer = ReplaceTransformer::new("a", "b");
        let before = replacer.construct_cache_key();

        let mut config = Configuration::new();
        config.insert(REPLACE_FROM.to_string(), "x".to_string());
        replacer.configure(&config);

        assert_ne!(replacer.construct_cache_key(), before);
        assert_eq!(render("xa", replacer), "ba\n");
    }
}
