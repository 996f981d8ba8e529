use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use rfidsystem::cache::{ManualClock, TtlCache};
use rfidsystem::hub::{CloseReason, EventHub, HubConfig};
use tokio::time::timeout;

#[tokio::test]
async fn cache_and_hub_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Cache hit, miss, expiry, and eviction
    let clock = Arc::new(ManualClock::new());
    let cache: TtlCache<String, u32> = TtlCache::new("metrics", 1, Duration::from_secs(60))
        .expect("valid cache")
        .with_clock(clock.clone());

    assert!(cache.get("a").is_none());
    cache.set("a".to_string(), 1);
    assert_eq!(cache.get("a"), Some(1));
    cache.set("b".to_string(), 2);
    clock.advance(Duration::from_secs(60));
    assert!(cache.get("b").is_none());

    // Publish drop, fan-out, and overflow removal
    let (hub, _task) = EventHub::spawn(HubConfig {
        publish_capacity: 2,
        subscriber_capacity: 1,
        ..HubConfig::default()
    });
    let mut slow = hub.subscribe().await.expect("hub running");
    hub.publish("scan", "one");
    hub.publish("scan", "two");
    hub.publish("scan", "three");

    let reason = timeout(Duration::from_secs(2), slow.closed())
        .await
        .expect("subscriber closed before timeout");
    assert_eq!(reason, CloseReason::Overflow);

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    // Fan-out is counted without per-topic series.
    for (composite_key, _, _, _) in &snapshot {
        if composite_key.key().name() == "rfid_hub_event_fanout_total" {
            assert_eq!(composite_key.key().labels().count(), 0);
        }
    }

    let expected = [
        "rfid_cache_hit_total",
        "rfid_cache_miss_total",
        "rfid_cache_expired_total",
        "rfid_cache_evict_total",
        "rfid_hub_subscribers",
        "rfid_hub_subscriber_removed_total",
        "rfid_hub_event_fanout_total",
        "rfid_hub_publish_dropped_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
