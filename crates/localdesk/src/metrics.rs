use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static ACTIVE_STREAMS: OnceLock<IntGauge> = OnceLock::new();
static INDEXED_DOCUMENTS: OnceLock<IntGauge> = OnceLock::new();

pub fn init_metrics() -> anyhow::Result<()> {
    let req_counter = IntCounterVec::new(
        prometheus::opts!("requests_total", "Total requests per route"),
        &["route", "status"],
    )?;
    if REQ_COUNTER.set(req_counter.clone()).is_ok() {
        REGISTRY.register(Box::new(req_counter))?;
    }

    let active_streams = IntGauge::new("active_chat_streams", "Chat completions currently streaming")?;
    if ACTIVE_STREAMS.set(active_streams.clone()).is_ok() {
        REGISTRY.register(Box::new(active_streams))?;
    }

    let indexed_documents = IntGauge::new("indexed_documents", "Document chunks available for retrieval")?;
    if INDEXED_DOCUMENTS.set(indexed_documents.clone()).is_ok() {
        REGISTRY.register(Box::new(indexed_documents))?;
    }
    Ok(())
}

pub fn inc_request(route: &str, status: StatusCode) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status.as_str()]).inc();
    }
}

pub fn inc_streams() {
    if let Some(gauge) = ACTIVE_STREAMS.get() {
        gauge.inc();
    }
}

pub fn dec_streams() {
    if let Some(gauge) = ACTIVE_STREAMS.get() {
        gauge.dec();
    }
}

pub fn set_indexed_documents(count: usize) {
    if let Some(gauge) = INDEXED_DOCUMENTS.get() {
        gauge.set(count as i64);
    }
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {}", e).into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        inc_request("/api/settings", StatusCode::OK);
        set_indexed_documents(3);

        let families = REGISTRY.gather();
        assert!(families.iter().any(|f| f.get_name() == "requests_total"));
        assert!(families.iter().any(|f| f.get_name() == "indexed_documents"));
    }
}
