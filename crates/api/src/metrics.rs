use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static GUARD_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static STORE_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn http_requests_total() -> &'static IntCounterVec {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new("twolane_http_requests_total", "API HTTP request count."),
                &["route", "method", "status"],
            )
            .expect("create twolane_http_requests_total"),
        )
    })
}

fn http_request_duration_seconds() -> &'static HistogramVec {
    HTTP_REQUEST_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "twolane_http_request_duration_seconds",
                    "API HTTP request duration in seconds.",
                )
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
                &["route", "method", "outcome"],
            )
            .expect("create twolane_http_request_duration_seconds"),
        )
    })
}

fn guard_decisions_total() -> &'static IntCounterVec {
    GUARD_DECISIONS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "twolane_guard_decisions_total",
                    "Route guard decisions by guard and outcome.",
                ),
                &["guard", "outcome"],
            )
            .expect("create twolane_guard_decisions_total"),
        )
    })
}

fn store_errors_total() -> &'static IntCounterVec {
    STORE_ERRORS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new("twolane_store_errors_total", "Store failures by kind."),
                &["kind"],
            )
            .expect("create twolane_store_errors_total"),
        )
    })
}

pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    http_requests_total()
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    http_request_duration_seconds()
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

pub fn observe_guard_decision(guard: &str, allowed: bool) {
    let outcome = if allowed { "allow" } else { "deny" };
    guard_decisions_total()
        .with_label_values(&[guard, outcome])
        .inc();
}

pub fn observe_store_error(kind: &str) {
    store_errors_total().with_label_values(&[kind]).inc();
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let _ = guard_decisions_total();
    let _ = store_errors_total();

    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
