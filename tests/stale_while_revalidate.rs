mod common;

use std::num::NonZeroUsize;
use std::sync::{Arc, Barrier};
use std::thread;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cachepipe::caching::{Cache, CacheRefreshManager, MemoryCache};
use cachepipe::pipeline::{AsyncCachePipeline, CachingPipeline, Parameters, PipelineComponent};
use cachepipe::stages::{TextEvent, TextSerializer};

use common::{Flaky, SharedBuffer, SourceTracker, VersionedSource};

const IDLE: Duration = Duration::from_secs(5);

fn refresher() -> Arc<CacheRefreshManager> {
    let threads = NonZeroUsize::new(4).expect("non-zero");
    Arc::new(CacheRefreshManager::new(threads).expect("refresh runtime"))
}

fn serving(
    cache: &Arc<MemoryCache>,
    refresher: &Arc<CacheRefreshManager>,
    stages: Vec<AddStage>,
) -> (AsyncCachePipeline<TextEvent>, SharedBuffer) {
    let mut pipeline = CachingPipeline::new(Arc::clone(cache) as Arc<dyn Cache>);
    for add_stage in stages {
        add_stage(&mut pipeline);
    }
    add(&mut pipeline, TextSerializer::new());

    let out = SharedBuffer::default();
    pipeline
        .setup(Box::new(out.clone()), &mut Parameters::for_run())
        .expect("setup");
    (AsyncCachePipeline::new(pipeline, Arc::clone(refresher)), out)
}

fn add<C>(pipeline: &mut CachingPipeline<TextEvent>, component: C)
where
    C: PipelineComponent<TextEvent> + 'static,
{
    pipeline.add_component(component).expect("add component");
}

type AddStage = Box<dyn FnOnce(&mut CachingPipeline<TextEvent>)>;

fn stage<C>(component: C) -> AddStage
where
    C: PipelineComponent<TextEvent> + 'static,
{
    Box::new(move |pipeline: &mut CachingPipeline<TextEvent>| add(pipeline, component))
}

fn source(tracker: &SourceTracker) -> AddStage {
    stage(VersionedSource::new(tracker))
}

#[test]
fn empty_cache_runs_on_the_calling_thread() {
    let cache = Arc::new(MemoryCache::unbounded());
    let refresher = refresher();
    let tracker = SourceTracker::default();

    let (pipeline, out) = serving(&cache, &refresher, vec![source(&tracker)]);
    pipeline.execute().expect("execute");

    assert_eq!(out.contents(), "version 0\n");
    assert_eq!(tracker.runs(), 1);
    assert_eq!(refresher.pending_count(), 0);
    assert_eq!(cache.len(), 1);
}

#[test]
fn stale_value_is_served_while_one_refresh_runs() {
    const READERS: usize = 4;
    let cache = Arc::new(MemoryCache::unbounded());
    let refresher = refresher();
    let tracker = SourceTracker::default();

    let readers: Vec<_> = (0..READERS)
        .map(|_| serving(&cache, &refresher, vec![source(&tracker)]))
        .collect();

    readers[0].0.execute().expect("initial run");
    assert_eq!(tracker.runs(), 1);

    tracker.bump();
    let gate = tracker.gate.lock().expect("gate");
    for (pipeline, _) in &readers {
        pipeline.execute().expect("stale read");
    }

    // The first reader's pipeline is busy refreshing, so ask another for the key.
    let key = readers[1].0.cache_key().expect("cacheable");
    assert!(refresher.is_pending(&key));
    assert_eq!(refresher.pending_count(), 1);
    for (_, out) in &readers[1..] {
        assert_eq!(out.contents(), "version 0\n");
    }

    drop(gate);
    assert!(refresher.wait_idle(IDLE), "refresh finished");
    assert_eq!(tracker.runs(), 2, "duplicate refreshes were dropped");

    for (pipeline, _) in &readers {
        pipeline.execute().expect("fresh read");
    }
    assert_eq!(tracker.runs(), 2);
    assert_eq!(
        readers[0].1.contents(),
        "version 0\nversion 0\nversion 1\n",
        "refresh output never reaches a reader's sink directly"
    );
    for (_, out) in &readers[1..] {
        assert_eq!(out.contents(), "version 0\nversion 1\n");
    }
}

#[test]
fn concurrent_stale_reads_schedule_one_refresh() {
    const READERS: usize = 8;
    let cache = Arc::new(MemoryCache::unbounded());
    let refresher = refresher();
    let tracker = SourceTracker::default();

    let (warm, _) = serving(&cache, &refresher, vec![source(&tracker)]);
    warm.execute().expect("initial run");
    assert_eq!(tracker.runs(), 1);

    let readers: Vec<_> = (0..READERS)
        .map(|_| serving(&cache, &refresher, vec![source(&tracker)]))
        .collect();

    tracker.bump();
    let gate = tracker.gate.lock().expect("gate");
    let barrier = Barrier::new(READERS);
    thread::scope(|scope| {
        for (pipeline, _) in &readers {
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                pipeline.execute().expect("stale read");
            });
        }
    });

    assert_eq!(refresher.pending_count(), 1, "one refresh for all readers");
    for (_, out) in &readers {
        assert_eq!(out.contents(), "version 0\n");
    }

    drop(gate);
    assert!(refresher.wait_idle(IDLE), "refresh finished");
    assert_eq!(tracker.runs(), 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn failed_refresh_keeps_stale_value_and_allows_retry() {
    let cache = Arc::new(MemoryCache::unbounded());
    let refresher = refresher();
    let tracker = SourceTracker::default();
    let failing = Arc::new(AtomicBool::new(false));

    let (pipeline, out) = serving(
        &cache,
        &refresher,
        vec![source(&tracker), stage(Flaky::new(&failing))],
    );

    pipeline.execute().expect("initial run");
    tracker.bump();
    failing.store(true, Ordering::SeqCst);

    pipeline.execute().expect("stale read");
    assert!(refresher.wait_idle(IDLE));
    assert_eq!(tracker.runs(), 2);
    assert_eq!(refresher.pending_count(), 0, "failure released the key");

    failing.store(false, Ordering::SeqCst);
    pipeline.execute().expect("stale read schedules a retry");
    assert!(refresher.wait_idle(IDLE));
    pipeline.execute().expect("fresh read");

    assert_eq!(tracker.runs(), 3);
    assert_eq!(
        out.contents(),
        "version 0\nversion 0\nversion 0\nversion 1\n"
    );
}

#[test]
fn refreshes_requested_after_shutdown_are_dropped() {
    let cache = Arc::new(MemoryCache::unbounded());
    let refresher = refresher();
    let tracker = SourceTracker::default();

    let (pipeline, out) = serving(&cache, &refresher, vec![source(&tracker)]);
    pipeline.execute().expect("initial run");

    refresher.shutdown(IDLE);
    tracker.bump();
    pipeline.execute().expect("stale read");

    assert_eq!(out.contents(), "version 0\nversion 0\n");
    assert_eq!(refresher.pending_count(), 0);
    assert_eq!(tracker.runs(), 1);
}
