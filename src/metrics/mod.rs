use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

// Batch calls issued per loader
static BATCH_DISPATCH: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shopgraph_batch_dispatch_total",
        "The total number of batch calls issued by loaders",
        &["loader"]
    )
    .unwrap()
});

// Keys resolved through batch calls per loader
static BATCH_KEYS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shopgraph_batch_keys_total",
        "The total number of distinct keys sent to batch calls",
        &["loader"]
    )
    .unwrap()
});

// Downstream dependency calls by outcome
static DOWNSTREAM_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shopgraph_downstream_calls_total",
        "Calls made through resilient proxies, by dependency and outcome",
        &[
            "dependency", // recommendations, shipping
            "outcome",    // success, cached, timeout, failure, unavailable, invalid
        ]
    )
    .unwrap()
});

pub fn record_batch(loader: &str, keys: usize) {
    BATCH_DISPATCH.with_label_values(&[loader]).inc();
    BATCH_KEYS.with_label_values(&[loader]).inc_by(keys as u64);
}

pub fn record_downstream(dependency: &str, outcome: &str) {
    DOWNSTREAM_CALLS
        .with_label_values(&[dependency, outcome])
        .inc();
}

pub fn downstream_count(dependency: &str, outcome: &str) -> u64 {
    DOWNSTREAM_CALLS
        .with_label_values(&[dependency, outcome])
        .get()
}

/// Render every registered metric in the prometheus text format
pub fn gather_text() -> String {
    use prometheus::{Encoder, TextEncoder};

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        log::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
