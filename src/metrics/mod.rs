//! Prometheus collectors for push delivery, acknowledgement correlation,
//! connection liveness and view synchronization.
//!
//! Collectors are process-wide; `gather_metrics()` renders them in the text
//! exposition format for whatever endpoint the embedding server exposes.

#[cfg(test)]
mod metrics_test;

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

lazy_static! {
    pub static ref PUSH_TOTAL_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("push_total", "Subscriber pushes by transport and outcome"),
        &["push_type", "result"]
    )
    .expect("metric can not be created");

    pub static ref IN_FLIGHT_RESOLVED_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("in_flight_resolved", "In-flight requests resolved by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_CONNECTIONS_METRIC: IntGauge =
        IntGauge::new("active_connections", "Tracked streaming connections")
            .expect("metric can not be created");

    pub static ref EVICTED_CONNECTIONS_METRIC: IntCounter = IntCounter::new(
        "evicted_connections",
        "Connections unregistered after failing liveness detection"
    )
    .expect("metric can not be created");

    pub static ref SYNC_REFRESH_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("sync_refresh", "Materialized view refresh passes by outcome"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref SYNC_CHANGED_SERVICES_METRIC: IntCounter = IntCounter::new(
        "sync_changed_services",
        "Services rebuilt because their revision changed"
    )
    .expect("metric can not be created");

    pub static ref WATCH_CLIENTS_METRIC: IntGauge =
        IntGauge::new("watch_clients", "Registered watch clients across push centers")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_DEFAULT: Once = Once::new();

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PUSH_TOTAL_METRIC.clone()),
        Box::new(IN_FLIGHT_RESOLVED_METRIC.clone()),
        Box::new(ACTIVE_CONNECTIONS_METRIC.clone()),
        Box::new(EVICTED_CONNECTIONS_METRIC.clone()),
        Box::new(SYNC_REFRESH_METRIC.clone()),
        Box::new(SYNC_CHANGED_SERVICES_METRIC.clone()),
        Box::new(WATCH_CLIENTS_METRIC.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Render the crate registry in the Prometheus text format
pub fn gather_metrics() -> String {
    REGISTER_DEFAULT.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
        return String::default();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
