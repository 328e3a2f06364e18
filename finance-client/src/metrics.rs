//! Client metrics

use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static::lazy_static! {
    pub static ref FINANCE_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "finance_requests_total",
        "Total requests sent to the finance backend",
        &["operation", "outcome"]
    )
    .unwrap();

    pub static ref FINANCE_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "finance_request_duration_seconds",
        "Finance backend request duration",
        &["operation"]
    )
    .unwrap();

    pub static ref LOCAL_VALIDATION_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "finance_local_validation_failures_total",
        "Operations refused before a request was sent",
        &["operation"]
    )
    .unwrap();
}

pub fn record_request(operation: &str, outcome: &str, seconds: f64) {
    FINANCE_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    FINANCE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(seconds);
}

pub fn record_local_rejection(operation: &str) {
    LOCAL_VALIDATION_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Default registry in text exposition format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_exported() {
        record_request("metrics_test", "ok", 0.01);
        record_local_rejection("metrics_test");

        let text = gather_text();
        assert!(text.contains("finance_requests_total"));
        assert!(text.contains("finance_local_validation_failures_total"));
        assert!(text.contains("metrics_test"));
    }
}
