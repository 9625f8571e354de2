//! Ordered chain of stages with an enforced lifecycle.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::caching::LastModified;

use super::component::{Parameters, PipelineComponent, Sink, Stage};
use super::error::{PipelineError, ProcessingError, SetupError};
use super::options::Configuration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Building,
    SetUp,
    Executed,
}

/// Stages run in insertion order: the first must start a run, the last must
/// finish it, and every adjacent pair must be a producer feeding a consumer.
pub struct Pipeline<E> {
    stages: Vec<Stage<E>>,
    state: Lifecycle,
}

impl<E: 'static> Pipeline<E> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            state: Lifecycle::Building,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn stages(&self) -> &[Stage<E>] {
        &self.stages
    }

    pub fn add_component<C>(&mut self, component: C) -> Result<(), SetupError>
    where
        C: PipelineComponent<E> + 'static,
    {
        if self.state != Lifecycle::Building {
            return Err(SetupError::AddAfterSetup);
        }

        let stage = Stage::new(component);
        debug!(component = %stage.name(), position = self.stages.len(), "Adding component");
        self.stages.push(stage);
        Ok(())
    }

    /// Hand `config` to every stage.
    pub fn configure(&mut self, config: &Configuration) {
        for stage in &self.stages {
            stage.lock("configure").configure(config);
        }
    }

    /// Validate the chain, set up and link every stage, then attach `sink`.
    #[instrument(skip_all, fields(stages = self.stages.len()))]
    pub fn setup(&mut self, sink: Sink, parameters: &mut Parameters) -> Result<(), SetupError> {
        if self.state != Lifecycle::Building {
            return Err(SetupError::AlreadySetUp);
        }

        let (Some(first), Some(last)) = (self.stages.first(), self.stages.last()) else {
            return Err(SetupError::Empty);
        };

        if first.lock("setup.check_first").as_starter().is_none() {
            error!(component = %first.name(), "First component is not a starter");
            return Err(SetupError::first_not_starter(first.name()));
        }
        if last.lock("setup.check_last").as_finisher().is_none() {
            error!(component = %last.name(), "Last component is not a finisher");
            return Err(SetupError::last_not_finisher(last.name()));
        }

        setup_stage(first, parameters)?;
        for pair in self.stages.windows(2) {
            link(&pair[0], &pair[1])?;
            setup_stage(&pair[1], parameters)?;
        }

        self.attach_output(sink);
        self.state = Lifecycle::SetUp;
        Ok(())
    }

    /// Run the chain once; every stage's `finish` runs whether or not the run succeeds.
    #[instrument(skip_all, fields(stages = self.stages.len()))]
    pub fn execute(&mut self) -> Result<(), PipelineError> {
        if self.state == Lifecycle::Building {
            return Err(SetupError::NotSetUp.into());
        }

        let result = self.run();
        self.state = Lifecycle::Executed;
        result.map_err(PipelineError::from)
    }

    pub(crate) fn mark_executed(&mut self) {
        self.state = Lifecycle::Executed;
    }

    /// Undo a completed setup whose caller then failed; the pipeline cannot run.
    pub(crate) fn abandon_setup(&mut self) {
        self.state = Lifecycle::Building;
    }

    /// Content type announced by the finisher.
    pub fn content_type(&self) -> Option<String> {
        let last = self.stages.last()?;
        let mut stage = last.lock("content_type");
        stage
            .as_finisher()
            .map(|finisher| finisher.content_type().to_owned())
    }

    pub fn last_modified(&self) -> LastModified {
        LastModified::Unknown
    }

    /// Point the finisher at a different sink.
    pub(crate) fn attach_output(&self, sink: Sink) {
        let Some(last) = self.stages.last() else {
            return;
        };
        let mut stage = last.lock("attach_output");
        if let Some(finisher) = stage.as_finisher() {
            finisher.set_output(sink);
        }
    }

    pub(crate) fn run(&self) -> Result<(), ProcessingError> {
        let Some(first) = self.stages.first() else {
            return Ok(());
        };
        debug!(starter = %first.name(), "Invoking starter");

        let result = {
            let mut starter = first.lock("run.starter");
            match starter.as_starter() {
                Some(starter) => starter
                    .execute()
                    .map_err(|err| ProcessingError::stage(Arc::clone(first.name()), err)),
                None => Ok(()),
            }
        };

        for stage in &self.stages {
            stage.lock("run.finish").finish();
        }

        if let Err(err) = &result {
            error!(error = %err, "Pipeline run failed");
        }
        result
    }
}

impl<E: 'static> Default for Pipeline<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn setup_stage<E: 'static>(
    stage: &Stage<E>,
    parameters: &mut Parameters,
) -> Result<(), SetupError> {
    stage
        .lock("setup")
        .setup(parameters)
        .map_err(|source| SetupError::Component {
            component: Arc::clone(stage.name()),
            source,
        })
}

fn link<E: 'static>(producer: &Stage<E>, consumer: &Stage<E>) -> Result<(), SetupError> {
    debug!(producer = %producer.name(), consumer = %consumer.name(), "Linking components");

    let mut guard = producer.lock("link.producer");
    let Some(upstream) = guard.as_producer() else {
        return Err(SetupError::NotProducer {
            producer: Arc::clone(producer.name()),
            consumer: Arc::clone(consumer.name()),
        });
    };
    if consumer.lock("link.consumer").as_consumer().is_none() {
        return Err(SetupError::NotConsumer {
            producer: Arc::clone(producer.name()),
            consumer: Arc::clone(consumer.name()),
        });
    }

    upstream
        .set_consumer(consumer.link())
        .map_err(|source| SetupError::ConsumerRejected {
            producer: Arc::clone(producer.name()),
            consumer: Arc::clone(consumer.name()),
            source,
        })
}
