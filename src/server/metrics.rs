use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Kaguya metrics
const PREFIX: &str = "kaguya";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Detection
    pub static ref MOOD_DETECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_mood_detections_total"), "Mood detections by outcome label"),
        &["mood"]
    ).expect("Failed to create mood_detections_total metric");

    pub static ref MOOD_DETECTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_mood_detection_duration_seconds"),
            "Face detection plus classification time in seconds"
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        &["source"]
    ).expect("Failed to create mood_detection_duration_seconds metric");

    // Spotify
    pub static ref SPOTIFY_API_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_spotify_api_calls_total"), "Spotify API calls by operation and outcome"),
        &["operation", "outcome"]
    ).expect("Failed to create spotify_api_calls_total metric");

    pub static ref PLAYLISTS_CREATED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_playlists_created_total"),
        "Playlists created on Spotify"
    ).expect("Failed to create playlists_created_total metric");

    // WebSocket
    pub static ref WS_ACTIVE_CONNECTIONS: Gauge = Gauge::new(
        format!("{PREFIX}_ws_active_connections"),
        "Open video mood WebSocket connections"
    ).expect("Failed to create ws_active_connections metric");

    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total API errors by type and status code"),
        &["error_type", "status"]
    ).expect("Failed to create errors_total metric");
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(MOOD_DETECTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MOOD_DETECTION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SPOTIFY_API_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PLAYLISTS_CREATED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WS_ACTIVE_CONNECTIONS.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// `mood` is the label name, or `none` when no face was found.
pub fn record_mood_detection(source: &str, mood: &str, duration: Duration) {
    MOOD_DETECTIONS_TOTAL.with_label_values(&[mood]).inc();
    MOOD_DETECTION_DURATION_SECONDS
        .with_label_values(&[source])
        .observe(duration.as_secs_f64());
}

pub fn record_spotify_call(operation: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    SPOTIFY_API_CALLS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_playlist_created() {
    PLAYLISTS_CREATED_TOTAL.inc();
}

pub fn ws_connection_opened() {
    WS_ACTIVE_CONNECTIONS.inc();
}

pub fn ws_connection_closed() {
    WS_ACTIVE_CONNECTIONS.dec();
}

pub fn record_error(error_type: &str, status: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, status])
        .inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
