use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use cachepipe::caching::{
    BoxError, Cache, CacheKey, CacheRefreshManager, CacheValue, MemoryCache, RefreshJob,
};
use metrics_util::debugging::DebuggingRecorder;

struct Gated(Barrier);

impl RefreshJob for Gated {
    fn refresh(&self, _key: &CacheKey) -> Result<(), BoxError> {
        self.0.wait();
        Ok(())
    }
}

struct Failing;

impl RefreshJob for Failing {
    fn refresh(&self, _key: &CacheKey) -> Result<(), BoxError> {
        Err("backend unavailable".into())
    }
}

#[test]
fn cache_and_refresh_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    cachepipe::telemetry::describe_metrics();

    // Store hit/miss/store/evict
    let cache = MemoryCache::bounded(NonZeroUsize::new(1).expect("non-zero"));
    let first = CacheKey::object("first");
    let second = CacheKey::object("second");

    assert!(cache.get(&first).is_none());
    cache.put(first.clone(), CacheValue::complete(first.clone(), "one"));
    assert!(cache.get(&first).is_some());
    cache.put(second.clone(), CacheValue::complete(second.clone(), "two"));
    assert!(cache.get(&first).is_none(), "capacity one evicts the first entry");

    // Refresh scheduling, deduplication, failure and latency
    let refresher = CacheRefreshManager::new(NonZeroUsize::new(2).expect("non-zero"))
        .expect("refresh runtime");
    let gated = Arc::new(Gated(Barrier::new(2)));
    refresher.refresh_cache_value(first.clone(), gated.clone());
    refresher.refresh_cache_value(first.clone(), gated.clone());
    gated.0.wait();
    refresher.refresh_cache_value(second, Arc::new(Failing));
    assert!(refresher.wait_idle(Duration::from_secs(5)));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "cachepipe_cache_hit_total",
        "cachepipe_cache_miss_total",
        "cachepipe_cache_store_total",
        "cachepipe_cache_evict_total",
        "cachepipe_refresh_scheduled_total",
        "cachepipe_refresh_deduplicated_total",
        "cachepipe_refresh_failed_total",
        "cachepipe_refresh_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
