use std::time::Duration;

mod endpoint;
pub use endpoint::{BrokerEndpoint, Credentials, Timeouts};

mod message;
pub use message::{OutboundMessage, WebhookMessage, MESSAGE_TTL};

mod transport;
pub use transport::Transport;

pub mod amqp;

mod manager;
pub use manager::{ConnectionManager, Handle, Link, UP_GAUGE};

mod gateway;
pub use gateway::{DeliveryGateway, Outcome};

pub mod ingress;
pub mod metrics_server;
pub mod server;

#[cfg(test)]
mod testing;

/// A broker operation driven by the bridge. Used to label errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Dial,
    BeginSession,
    AttachSender,
    Send,
    CloseSender,
    EndSession,
    CloseConnection,
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Op::Dial => "dial",
            Op::BeginSession => "begin session",
            Op::AttachSender => "attach sender",
            Op::Send => "send",
            Op::CloseSender => "close sender",
            Op::EndSession => "end session",
            Op::CloseConnection => "close connection",
        })
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to dial AMQP broker")]
    Dial(#[source] BoxError),
    #[error("failed to begin AMQP session")]
    Session(#[source] BoxError),
    #[error("failed to attach sender to link '{address}'")]
    Attach {
        address: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to send message")]
    Send(#[source] BoxError),
    #[error("broker did not accept message: {0}")]
    Rejected(String),
    #[error("failed to {op}")]
    Close {
        op: Op,
        #[source]
        source: BoxError,
    },
    #[error("{op} timed out after {after:?}")]
    Timeout { op: Op, after: Duration },
    #[error("no AMQP sender is ready")]
    NotConnected,
}

impl Error {
    /// The operation which produced this error.
    pub fn op(&self) -> Op {
        match self {
            Error::Dial(_) => Op::Dial,
            Error::Session(_) => Op::BeginSession,
            Error::Attach { .. } => Op::AttachSender,
            Error::Send(_) | Error::Rejected(_) | Error::NotConnected => Op::Send,
            Error::Close { op, .. } | Error::Timeout { op, .. } => *op,
        }
    }
}

/// Run `fut` under a deadline of `after`, mapping expiry into [`Error::Timeout`].
/// Each call derives its own deadline; nothing is shared across operations.
pub(crate) async fn bounded<F, T>(op: Op, after: Duration, fut: F) -> Result<T, Error>
where
    F: std::future::Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(Error::Timeout { op, after }),
    }
}
