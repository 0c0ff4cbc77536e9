use crate::{BrokerEndpoint, Error, OutboundMessage};

/// Transport is the seam between the bridge and a message broker client.
///
/// It exposes each step of the connection / session / sender chain
/// individually, so that the [`ConnectionManager`](crate::ConnectionManager)
/// can decide how the chain is built, torn down, and rebuilt.
/// Implementations should not apply deadlines of their own: every call
/// is already bounded by the caller.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    type Connection: Send + 'static;
    type Session: Send + 'static;
    type Sender: Send + 'static;

    /// Dial and authenticate to the broker.
    async fn dial(&self, endpoint: &BrokerEndpoint) -> Result<Self::Connection, Error>;

    /// Begin a session on an open connection.
    async fn begin_session(&self, connection: &mut Self::Connection)
        -> Result<Self::Session, Error>;

    /// Attach a sender link targeting `address`.
    async fn attach_sender(
        &self,
        session: &mut Self::Session,
        address: &str,
    ) -> Result<Self::Sender, Error>;

    /// Send `message` and wait for the broker's disposition.
    async fn send(&self, sender: &mut Self::Sender, message: &OutboundMessage)
        -> Result<(), Error>;

    async fn close_sender(&self, sender: Self::Sender) -> Result<(), Error>;

    async fn end_session(&self, session: Self::Session) -> Result<(), Error>;

    async fn close_connection(&self, connection: Self::Connection) -> Result<(), Error>;
}
