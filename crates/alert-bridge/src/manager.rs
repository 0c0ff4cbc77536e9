use crate::{bounded, BrokerEndpoint, Error, Op, OutboundMessage, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Gauge which is 1 while a sender link is ready, and 0 otherwise.
pub const UP_GAUGE: &str = "amqp_up";

/// Link is a live connection / session / sender triple.
pub struct Link<T: Transport> {
    connection: T::Connection,
    session: T::Session,
    sender: T::Sender,
}

struct State<T: Transport> {
    // Ready if Some, and absent otherwise.
    link: Option<Link<T>>,
    // Number of Links which have been established.
    generation: u64,
}

/// ConnectionManager owns the single Link to the broker.
///
/// All access to the Link goes through a [`Handle`], which holds the manager's
/// lock for as long as it lives. Tasks which need the Link while another task
/// rebuilds it wait for the lock, and then observe the rebuilt Link rather than
/// starting a rebuild of their own.
///
/// Broker failures are never returned from connect() or recover(): they're
/// logged and leave the manager without a Link, which callers observe through
/// [`Handle::is_ready`].
pub struct ConnectionManager<T: Transport> {
    transport: T,
    endpoint: BrokerEndpoint,
    state: tokio::sync::Mutex<State<T>>,
    up: AtomicBool,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, endpoint: BrokerEndpoint) -> Self {
        let manager = Self {
            transport,
            endpoint,
            state: tokio::sync::Mutex::new(State {
                link: None,
                generation: 0,
            }),
            up: AtomicBool::new(false),
        };
        manager.set_up(false);
        manager
    }

    /// Is a Link currently ready? Mirrors the [`UP_GAUGE`] gauge.
    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    /// Acquire exclusive access to the Link, waiting for any in-progress rebuild.
    pub async fn lock(&self) -> Handle<'_, T> {
        Handle {
            manager: self,
            state: self.state.lock().await,
        }
    }

    /// Establish a Link if there isn't one already.
    pub async fn connect(&self) {
        self.lock().await.connect().await
    }

    /// Establish a Link from a background task, so that the caller isn't held
    /// up by an unreachable broker. Requests rebuild the Link on demand.
    pub fn spawn_connect(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move { manager.connect().await })
    }

    /// Discard the current Link, if any, and establish a new one.
    pub async fn recover(&self) {
        self.lock().await.recover().await
    }

    /// Release the current Link without establishing another.
    pub async fn close(&self) {
        self.lock().await.close().await
    }

    fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
        metrics::gauge!(UP_GAUGE).set(if up { 1.0 } else { 0.0 });
    }

    async fn open_link(&self) -> Result<Link<T>, Error> {
        let BrokerEndpoint {
            address, timeouts, ..
        } = &self.endpoint;

        let mut connection = bounded(
            Op::Dial,
            timeouts.connect,
            self.transport.dial(&self.endpoint),
        )
        .await?;

        let mut session = match bounded(
            Op::BeginSession,
            timeouts.connect,
            self.transport.begin_session(&mut connection),
        )
        .await
        {
            Ok(session) => session,
            Err(err) => {
                self.release_connection(connection).await;
                return Err(err);
            }
        };

        let sender = match bounded(
            Op::AttachSender,
            timeouts.connect,
            self.transport.attach_sender(&mut session, address),
        )
        .await
        {
            Ok(sender) => sender,
            Err(err) => {
                self.release_session(session).await;
                self.release_connection(connection).await;
                return Err(err);
            }
        };

        Ok(Link {
            connection,
            session,
            sender,
        })
    }

    async fn release_link(&self, link: Link<T>) {
        let Link {
            connection,
            session,
            sender,
        } = link;

        release(
            Op::CloseSender,
            self.close_timeout(),
            self.transport.close_sender(sender),
        )
        .await;
        self.release_session(session).await;
        self.release_connection(connection).await;
    }

    async fn release_session(&self, session: T::Session) {
        release(
            Op::EndSession,
            self.close_timeout(),
            self.transport.end_session(session),
        )
        .await
    }

    async fn release_connection(&self, connection: T::Connection) {
        release(
            Op::CloseConnection,
            self.close_timeout(),
            self.transport.close_connection(connection),
        )
        .await
    }

    fn close_timeout(&self) -> Duration {
        self.endpoint.timeouts.close
    }
}

// Close errors are logged and otherwise ignored.
async fn release<F>(op: Op, after: Duration, fut: F)
where
    F: std::future::Future<Output = Result<(), Error>>,
{
    if let Err(err) = bounded(op, after, fut).await {
        tracing::warn!(%op, error = ?err, "failed to release stale AMQP resource");
    }
}

/// Handle is exclusive access to the ConnectionManager's Link.
/// Dropping it, including by cancellation of the owning future,
/// leaves the manager either with a ready Link or with none.
pub struct Handle<'m, T: Transport> {
    manager: &'m ConnectionManager<T>,
    state: tokio::sync::MutexGuard<'m, State<T>>,
}

impl<'m, T: Transport> Handle<'m, T> {
    pub fn is_ready(&self) -> bool {
        self.state.link.is_some()
    }

    /// Number of Links established over the lifetime of the manager.
    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Establish a Link if there isn't one already.
    pub async fn connect(&mut self) {
        if self.is_ready() {
            return;
        }
        let manager = self.manager;
        let endpoint = &manager.endpoint;

        match manager.open_link().await {
            Ok(link) => {
                self.state.link = Some(link);
                self.state.generation += 1;
                manager.set_up(true);

                tracing::info!(
                    url = %endpoint.url,
                    address = %endpoint.address,
                    generation = self.state.generation,
                    "connected to AMQP broker"
                );
            }
            Err(err) => {
                tracing::error!(
                    url = %endpoint.url,
                    address = %endpoint.address,
                    op = %err.op(),
                    error = ?err,
                    "failed to connect to AMQP broker"
                );
            }
        }
    }

    /// Discard the current Link, if any, and establish a new one.
    #[tracing::instrument(level = "debug", skip(self), fields(generation = self.state.generation))]
    pub async fn recover(&mut self) {
        self.close().await;
        self.connect().await;
    }

    /// Release the current Link without establishing another.
    pub async fn close(&mut self) {
        // Lower liveness, then detach the Link from shared state, before any await point.
        self.manager.set_up(false);
        let stale = self.state.link.take();

        if let Some(link) = stale {
            self.manager.release_link(link).await;
        }
    }

    /// Send `message` over the current Link, under the send timeout.
    /// The Link is left in place on failure: it's up to the caller to recover.
    pub async fn send(&mut self, message: &OutboundMessage) -> Result<(), Error> {
        let manager = self.manager;
        let Some(link) = self.state.link.as_mut() else {
            return Err(Error::NotConnected);
        };
        bounded(
            Op::Send,
            manager.endpoint.timeouts.send,
            manager.transport.send(&mut link.sender, message),
        )
        .await
    }
}
