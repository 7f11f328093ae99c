use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "registrar_cache_hit_total",
            Unit::Count,
            "Lookups answered from the cache, labelled by entity kind."
        );
        describe_counter!(
            "registrar_cache_miss_total",
            Unit::Count,
            "Lookups that fell through to the store, labelled by entity kind."
        );
        describe_counter!(
            "registrar_cache_invalidate_total",
            Unit::Count,
            "Cache entries deleted after a write, labelled by entity kind."
        );
        describe_counter!(
            "registrar_cache_error_total",
            Unit::Count,
            "Cache backend failures absorbed as misses or skipped invalidations."
        );
        describe_counter!(
            "registrar_enroll_accepted_total",
            Unit::Count,
            "Enrollment submissions accepted into the queue."
        );
        describe_counter!(
            "registrar_enroll_rejected_total",
            Unit::Count,
            "Enrollment submissions refused at admission, labelled by reason."
        );
        describe_counter!(
            "registrar_worker_applied_total",
            Unit::Count,
            "Work items that produced an enrollment."
        );
        describe_counter!(
            "registrar_worker_duplicate_total",
            Unit::Count,
            "Redelivered work items acknowledged without side effects."
        );
        describe_counter!(
            "registrar_worker_rejected_total",
            Unit::Count,
            "Work items refused at apply time and compensated."
        );
        describe_counter!(
            "registrar_worker_retry_total",
            Unit::Count,
            "Apply attempts that failed and were retried."
        );
        describe_counter!(
            "registrar_worker_dead_lettered_total",
            Unit::Count,
            "Work items parked after exhausting their attempts."
        );
        describe_counter!(
            "registrar_worker_restart_total",
            Unit::Count,
            "Unexpected queue worker exits followed by a restart."
        );
        describe_counter!(
            "registrar_drop_total",
            Unit::Count,
            "Enrollments removed through the drop pipeline."
        );
        describe_counter!(
            "registrar_drop_occupancy_failed_total",
            Unit::Count,
            "Drops whose course occupancy decrement failed."
        );
        describe_histogram!(
            "registrar_worker_apply_ms",
            Unit::Milliseconds,
            "Time to settle one work item including retries."
        );
    });
}
