use crate::{DeliveryGateway, OutboundMessage, Outcome, Transport, WebhookMessage};
use axum::http::StatusCode;

/// Rejections of a webhook request. These are never retryable:
/// Alertmanager does not re-send requests which fail with a 4xx status.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("failed to decode webhook message")]
    Decode(#[from] serde_json::Error),
    #[error("expected exactly one alert, but the webhook message has {0}")]
    AlertCount(usize),
}

impl axum::response::IntoResponse for IngressError {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(error = ?anyhow::Error::new(self), "rejecting webhook request");
        StatusCode::BAD_REQUEST.into_response()
    }
}

/// Decode a webhook body, returning its single alert.
pub fn decode(body: &[u8]) -> Result<serde_json::Map<String, serde_json::Value>, IngressError> {
    let WebhookMessage {
        receiver,
        group_key,
        status,
        mut alerts,
        ..
    } = serde_json::from_slice(body)?;

    if alerts.len() != 1 {
        return Err(IngressError::AlertCount(alerts.len()));
    }
    tracing::debug!(?receiver, ?group_key, ?status, "decoded webhook message");

    Ok(alerts.swap_remove(0))
}

/// Receive a webhook request from Alertmanager and forward its alert.
///
/// Malformed requests and requests with other than one alert are rejected with
/// 400 Bad Request. Broker failures map to 503 Service Unavailable, which
/// Alertmanager will retry. Delivered alerts are acknowledged with an empty 200.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = body.len()))]
pub async fn receive_alert<T: Transport>(
    axum::extract::State(gateway): axum::extract::State<DeliveryGateway<T>>,
    body: bytes::Bytes,
) -> Result<StatusCode, IngressError> {
    let alert = decode(&body)?;
    let message = OutboundMessage::for_alert(alert);

    Ok(match gateway.deliver(&message).await {
        Outcome::Delivered => StatusCode::OK,
        Outcome::TransientFailure => StatusCode::SERVICE_UNAVAILABLE,
    })
}
