use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

use crate::error::UpstreamStep;
use crate::models::SessionState;

static UPSTREAM_CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "recording_service_upstream_calls_total",
            "Calls to the media vendor and object store by step and outcome",
        ),
        &["step", "outcome"],
    )
    .expect("failed to create recording_service_upstream_calls_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register recording_service_upstream_calls_total");
    counter
});

static SESSION_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "recording_service_session_transitions_total",
            "Recording sessions entering each lifecycle state",
        ),
        &["state"],
    )
    .expect("failed to create recording_service_session_transitions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register recording_service_session_transitions_total");
    counter
});

static PENDING_SWEPT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "recording_service_pending_acquisitions_swept_total",
        "Stale pending-acquisition markers removed by the sweeper",
    )
    .expect("failed to create recording_service_pending_acquisitions_swept_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register recording_service_pending_acquisitions_swept_total");
    counter
});

pub fn record_upstream_call(step: UpstreamStep, outcome: &str) {
    UPSTREAM_CALLS_TOTAL
        .with_label_values(&[step.as_str(), outcome])
        .inc();
}

pub fn record_transition(state: SessionState) {
    SESSION_TRANSITIONS_TOTAL
        .with_label_values(&[state.as_str()])
        .inc();
}

pub fn record_pending_swept(count: usize) {
    PENDING_SWEPT_TOTAL.inc_by(count as u64);
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
