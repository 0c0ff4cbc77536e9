use crate::UP_GAUGE;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub const BUILD_INFO: &str = "alert2amqp_build_info";
pub const REQUESTS_TOTAL: &str = "amqp_handler_requests_total";
pub const REQUEST_DURATION: &str = "amqp_handler_request_duration_seconds";
pub const IN_FLIGHT: &str = "amqp_handler_in_flight_requests";

const REQUEST_DURATION_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Prometheus exporter configuration for the bridge's metrics.
pub fn builder() -> Result<PrometheusBuilder, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(REQUEST_DURATION.to_string()),
        REQUEST_DURATION_BUCKETS,
    )
}

/// Install the process-wide Prometheus recorder, describe the bridge's metrics,
/// and record build information.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = builder()?.install_recorder()?;

    metrics::describe_gauge!(UP_GAUGE, "Status of the AMQP connection");
    metrics::describe_gauge!(
        BUILD_INFO,
        "A metric with a constant '1' value labeled by the version and minimum supported Rust version with which alert2amqp was built."
    );
    metrics::describe_counter!(REQUESTS_TOTAL, "A counter for requests to the wrapped handler.");
    metrics::describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "A histogram of latencies for requests."
    );
    metrics::describe_gauge!(
        IN_FLIGHT,
        "A gauge of requests currently being served by the wrapped handler."
    );
    record_build_info();

    Ok(handle)
}

pub fn record_build_info() {
    metrics::gauge!(
        BUILD_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
        "msrv" => env!("CARGO_PKG_RUST_VERSION")
    )
    .set(1.0);
}

pub fn build_router(handle: PrometheusHandle) -> axum::Router<()> {
    use axum::routing::get;

    axum::Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(handle)
}

#[tracing::instrument(skip_all)]
async fn prometheus_metrics(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> (axum::http::StatusCode, String) {
    (axum::http::StatusCode::OK, handle.render())
}

/// Middleware which records request counts, latencies, and the number of
/// requests in flight.
pub async fn track_requests(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().to_string();
    let started = std::time::Instant::now();
    let _in_flight = InFlight::enter();

    let response = next.run(request).await;

    metrics::counter!(
        REQUESTS_TOTAL,
        "code" => response.status().as_u16().to_string(),
        "method" => method.clone()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method)
        .record(started.elapsed().as_secs_f64());

    response
}

// Decrements the in-flight gauge when dropped, including when the request is cancelled.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        metrics::gauge!(IN_FLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::gauge!(IN_FLIGHT).decrement(1.0);
    }
}
