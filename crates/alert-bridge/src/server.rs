use crate::{ingress, metrics_server, DeliveryGateway, Transport};
use metrics_exporter_prometheus::PrometheusHandle;


/// Build the bridge's HTTP surface: the Alertmanager webhook at `POST` of any
/// path, instrumented with request metrics, and Prometheus metrics at `GET /metrics`.
pub fn build_router<T: Transport>(
    gateway: DeliveryGateway<T>,
    prometheus: PrometheusHandle,
) -> axum::Router<()> {
    use axum::routing::post;

    let webhook = axum::Router::new()
        .route("/", post(ingress::receive_alert::<T>))
        .route("/{*path}", post(ingress::receive_alert::<T>))
        .route_layer(axum::middleware::from_fn(metrics_server::track_requests))
        .with_state(gateway);

    webhook
        .merge(metrics_server::build_router(prometheus))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
