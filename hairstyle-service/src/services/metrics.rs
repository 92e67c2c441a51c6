//! Prometheus metrics for hairstyle-service.
//!
//! Recording helpers are no-ops until [`init_metrics`] has run, which keeps
//! unit tests free of global setup.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    provider_attempts_total: IntCounterVec,
    provider_latency_seconds: Histogram,
    normalization_total: IntCounterVec,
}

impl Metrics {
    fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // outcome: success, no_image, rate_limited, forbidden, invalid_request, unknown, internal
        let requests_total = IntCounterVec::new(
            Opts::new(
                "hairstyle_requests_total",
                "Total hairstyle analysis requests by outcome",
            ),
            &["outcome"],
        )?;

        // result: ok or the classified error kind
        let provider_attempts_total = IntCounterVec::new(
            Opts::new(
                "hairstyle_provider_attempts_total",
                "Calls made to the AI provider, including retries",
            ),
            &["result"],
        )?;

        let provider_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "hairstyle_provider_latency_seconds",
                "Latency of a single AI provider call in seconds",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        // path: parsed, no_candidate, unparseable
        let normalization_total = IntCounterVec::new(
            Opts::new(
                "hairstyle_normalization_total",
                "Normalized model responses by path taken",
            ),
            &["path"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(provider_attempts_total.clone()))?;
        registry.register(Box::new(provider_latency_seconds.clone()))?;
        registry.register(Box::new(normalization_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            provider_attempts_total,
            provider_latency_seconds,
            normalization_total,
        })
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics. Safe to call more than once, from any thread.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    if METRICS.get().is_none() {
        let metrics = Metrics::new()?;
        METRICS.get_or_init(|| metrics);
    }

    Ok(())
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather() -> Result<String, prometheus::Error> {
    let Some(metrics) = METRICS.get() else {
        return Ok(String::new());
    };

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metrics.registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn record_request(outcome: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.requests_total.with_label_values(&[outcome]).inc();
    }
}

pub fn record_provider_attempt(result: &str, elapsed: Duration) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .provider_attempts_total
            .with_label_values(&[result])
            .inc();
        metrics
            .provider_latency_seconds
            .observe(elapsed.as_secs_f64());
    }
}

pub fn record_normalization(path: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.normalization_total.with_label_values(&[path]).inc();
    }
}
