//! AMQP 1.0 implementation of [`Transport`], backed by `fe2o3-amqp`.

use crate::{BrokerEndpoint, Error, Op, OutboundMessage, Transport};
use fe2o3_amqp::{
    connection::ConnectionHandle,
    sasl_profile::SaslProfile,
    session::SessionHandle,
    types::{
        messaging::{Header, Message, Outcome},
        primitives::Binary,
    },
    Connection, Sender, Session,
};
use std::time::Duration;

/// Amqp dials brokers speaking AMQP 1.0, authenticating with SASL PLAIN.
#[derive(Debug, Clone)]
pub struct Amqp {
    container_id: String,
    link_name: String,
}

impl Amqp {
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self {
            container_id: format!("alert-bridge-{id}"),
            link_name: format!("alert-bridge-sender-{id}"),
        }
    }
}

impl Default for Amqp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for Amqp {
    type Connection = ConnectionHandle<()>;
    type Session = SessionHandle<()>;
    type Sender = Sender;

    async fn dial(&self, endpoint: &BrokerEndpoint) -> Result<Self::Connection, Error> {
        let profile = SaslProfile::Plain {
            username: endpoint.credentials.username.clone(),
            password: endpoint.credentials.password.clone(),
        };

        Connection::builder()
            .container_id(self.container_id.clone())
            .sasl_profile(profile)
            .open(endpoint.url.as_str())
            .await
            .map_err(|err| Error::Dial(Box::new(err)))
    }

    async fn begin_session(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<Self::Session, Error> {
        Session::begin(connection)
            .await
            .map_err(|err| Error::Session(Box::new(err)))
    }

    async fn attach_sender(
        &self,
        session: &mut Self::Session,
        address: &str,
    ) -> Result<Self::Sender, Error> {
        Sender::attach(session, self.link_name.clone(), address.to_string())
            .await
            .map_err(|err| Error::Attach {
                address: address.to_string(),
                source: Box::new(err),
            })
    }

    async fn send(
        &self,
        sender: &mut Self::Sender,
        message: &OutboundMessage,
    ) -> Result<(), Error> {
        let header = Header {
            durable: message.durable,
            ttl: Some(ttl_millis(message.ttl)),
            ..Default::default()
        };
        let message = Message::builder()
            .header(header)
            .data(Binary::from(message.payload.to_vec()))
            .build();

        match sender
            .send(message)
            .await
            .map_err(|err| Error::Send(Box::new(err)))?
        {
            Outcome::Accepted(_) => Ok(()),
            outcome => Err(Error::Rejected(format!("{outcome:?}"))),
        }
    }

    async fn close_sender(&self, sender: Self::Sender) -> Result<(), Error> {
        sender.close().await.map_err(|err| Error::Close {
            op: Op::CloseSender,
            source: Box::new(err),
        })
    }

    async fn end_session(&self, mut session: Self::Session) -> Result<(), Error> {
        session.end().await.map_err(|err| Error::Close {
            op: Op::EndSession,
            source: Box::new(err),
        })
    }

    async fn close_connection(&self, mut connection: Self::Connection) -> Result<(), Error> {
        connection.close().await.map_err(|err| Error::Close {
            op: Op::CloseConnection,
            source: Box::new(err),
        })
    }
}

/// AMQP expresses TTL as a u32 count of milliseconds, which tops out near 49.7 days.
/// Longer TTLs are clamped rather than wrapped.
fn ttl_millis(ttl: Duration) -> u32 {
    u32::try_from(ttl.as_millis()).unwrap_or(u32::MAX)
}
