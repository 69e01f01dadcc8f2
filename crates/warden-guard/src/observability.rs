//! Tracing and metrics wiring for services embedding the guard.
//!
//! # Purpose
//! Installs a `tracing` subscriber (env filter + fmt layer) and a Prometheus
//! metrics recorder so guard decisions, denials and audit failures are
//! visible without extra setup.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
//! Hosts that already install their own subscriber or recorder keep theirs;
//! the guard only emits through the `tracing` and `metrics` facades.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();

pub const DECISIONS_TOTAL: &str = "warden_authz_decisions_total";
pub const DENIALS_TOTAL: &str = "warden_authz_denials_total";
pub const AUDIT_SINK_FAILURES_TOTAL: &str = "warden_audit_sink_failures_total";

pub fn init_observability(service_name: &str) -> PrometheusHandle {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
        tracing::info!(service = service_name, "observability initialized");
    });

    install_metrics_recorder()
}

pub fn install_metrics_recorder() -> PrometheusHandle {
    if let Some(handle) = METRICS_HANDLE.get() {
        return handle.clone();
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("install metrics recorder");
    let _ = METRICS_HANDLE.set(handle.clone());
    handle
}
