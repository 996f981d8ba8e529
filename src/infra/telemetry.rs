use std::{env, sync::Once};

use metrics::{Unit, describe_counter, describe_gauge};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let builder = EnvFilter::builder().with_default_directive(logging.level.into());
    let env_filter = if env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        builder.from_env_lossy()
    } else {
        builder.parse_lossy(default_directives(logging.level))
    };

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Dependency crates that log per connection stay at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "h2", "tower", "tower_http", "mio"];

fn default_directives(level: LevelFilter) -> String {
    let mut directives = level.to_string().to_ascii_lowercase();
    for target in QUIET_DEPENDENCIES {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

pub(crate) fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "rfid_cache_hit_total",
            Unit::Count,
            "Lookups answered from a student cache, labelled by cache."
        );
        describe_counter!(
            "rfid_cache_miss_total",
            Unit::Count,
            "Lookups that missed a student cache, including expired entries."
        );
        describe_counter!(
            "rfid_cache_expired_total",
            Unit::Count,
            "Entries dropped because their lifetime elapsed."
        );
        describe_counter!(
            "rfid_cache_evict_total",
            Unit::Count,
            "Entries evicted as least recently used to stay within capacity."
        );
        describe_gauge!(
            "rfid_hub_subscribers",
            Unit::Count,
            "Live event-stream subscribers."
        );
        describe_counter!(
            "rfid_hub_subscriber_removed_total",
            Unit::Count,
            "Subscribers removed from the hub, labelled by reason."
        );
        describe_counter!(
            "rfid_hub_event_fanout_total",
            Unit::Count,
            "Event deliveries to subscriber buffers."
        );
        describe_counter!(
            "rfid_hub_publish_dropped_total",
            Unit::Count,
            "Events dropped because the publish queue was full."
        );
        describe_counter!(
            "rfid_scan_log_recorded_total",
            Unit::Count,
            "Scan log entries recorded, labelled by status."
        );
    });
}
