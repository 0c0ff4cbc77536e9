use crate::{ConnectionManager, OutboundMessage, Transport};
use std::sync::Arc;

/// Outcome of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// The broker was unreachable, or the message could not be sent even after
    /// rebuilding the connection. The caller may try again later.
    TransientFailure,
}

/// DeliveryGateway sends single messages over the managed Link,
/// recovering the Link and retrying exactly once on failure.
pub struct DeliveryGateway<T: Transport> {
    manager: Arc<ConnectionManager<T>>,
}

impl<T: Transport> Clone for DeliveryGateway<T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<T: Transport> DeliveryGateway<T> {
    pub fn new(manager: Arc<ConnectionManager<T>>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<T>> {
        &self.manager
    }

    /// Deliver `message`.
    ///
    /// The Link is held for the whole attempt, so concurrent deliveries are
    /// serialized and at most one of them rebuilds a broken Link.
    /// A second failure is final: callers are expected to re-deliver
    /// on a TransientFailure, rather than have this gateway retry indefinitely.
    #[tracing::instrument(level = "debug", skip_all, fields(bytes = message.payload.len()))]
    pub async fn deliver(&self, message: &OutboundMessage) -> Outcome {
        let mut link = self.manager.lock().await;

        if !link.is_ready() {
            link.recover().await;
        }
        if !link.is_ready() {
            tracing::error!("no connection to AMQP broker");
            return Outcome::TransientFailure;
        }

        let err = match link.send(message).await {
            Ok(()) => return Outcome::Delivered,
            Err(err) => err,
        };
        tracing::warn!(
            error = ?err,
            generation = link.generation(),
            "failed to send message, recovering AMQP connection to retry"
        );

        link.recover().await;
        if !link.is_ready() {
            tracing::error!("no connection to AMQP broker after recovery");
            return Outcome::TransientFailure;
        }

        match link.send(message).await {
            Ok(()) => Outcome::Delivered,
            Err(err) => {
                tracing::error!(error = ?err, "failed to send message after retry");
                Outcome::TransientFailure
            }
        }
    }
}
