use std::collections::BTreeMap;
use std::time::Duration;

/// Time-to-live of every forwarded message: one year.
pub const MESSAGE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// WebhookMessage is the body which Alertmanager POSTs to webhook receivers.
///
/// Only `alerts` is required. Individual alerts are kept as opaque JSON objects
/// and are forwarded as-is; the remaining envelope fields are used for log context.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub group_key: Option<String>,
    #[serde(default)]
    pub truncated_alerts: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub group_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_annotations: BTreeMap<String, String>,
    #[serde(default, rename = "externalURL")]
    pub external_url: Option<String>,
    pub alerts: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// A message as written to the broker sender link.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Serialized JSON of exactly one alert.
    pub payload: bytes::Bytes,
    pub durable: bool,
    pub ttl: Duration,
}

impl OutboundMessage {
    /// Wrap `payload` as a durable message which expires after [`MESSAGE_TTL`].
    pub fn new(payload: bytes::Bytes) -> Self {
        Self {
            payload,
            durable: true,
            ttl: MESSAGE_TTL,
        }
    }

    /// Serialize a single alert into the message payload.
    pub fn for_alert(alert: serde_json::Map<String, serde_json::Value>) -> Self {
        let payload = serde_json::Value::Object(alert).to_string();
        Self::new(payload.into())
    }
}
