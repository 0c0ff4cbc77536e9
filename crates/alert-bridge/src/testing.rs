use crate::{BrokerEndpoint, Credentials, Error, OutboundMessage, Timeouts, Transport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory Transport which records every call and fails on request.
/// Clones share state, so a test may keep one to inspect a manager's transport.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    dials: AtomicUsize,
    sessions: AtomicUsize,
    attaches: AtomicUsize,
    sends: AtomicUsize,
    sender_closes: AtomicUsize,
    session_ends: AtomicUsize,
    connection_closes: AtomicUsize,

    // Live connections (dialed and not yet dropped), and the high-water mark thereof.
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,

    broker_down: AtomicBool,
    fail_sessions: AtomicBool,
    fail_attaches: AtomicBool,
    fail_sends: AtomicUsize,
    fail_closes: AtomicBool,
    hang_sends: AtomicBool,
    dial_delay: Mutex<Duration>,

    sent: Mutex<Vec<OutboundMessage>>,
}

pub struct MockConnection {
    live: Arc<AtomicUsize>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockSession;

pub struct MockSender;

impl MockTransport {
    /// While down, every dial fails.
    pub fn set_broker_down(&self, down: bool) {
        self.inner.broker_down.store(down, Ordering::SeqCst);
    }
    pub fn fail_sessions(&self, fail: bool) {
        self.inner.fail_sessions.store(fail, Ordering::SeqCst);
    }
    pub fn fail_attaches(&self, fail: bool) {
        self.inner.fail_attaches.store(fail, Ordering::SeqCst);
    }
    /// Fail the next `n` sends.
    pub fn fail_next_sends(&self, n: usize) {
        self.inner.fail_sends.store(n, Ordering::SeqCst);
    }
    pub fn fail_closes(&self, fail: bool) {
        self.inner.fail_closes.store(fail, Ordering::SeqCst);
    }
    /// Sends never complete.
    pub fn hang_sends(&self, hang: bool) {
        self.inner.hang_sends.store(hang, Ordering::SeqCst);
    }
    pub fn set_dial_delay(&self, delay: Duration) {
        *self.inner.dial_delay.lock().unwrap() = delay;
    }

    pub fn dials(&self) -> usize {
        self.inner.dials.load(Ordering::SeqCst)
    }
    pub fn sessions(&self) -> usize {
        self.inner.sessions.load(Ordering::SeqCst)
    }
    pub fn attaches(&self) -> usize {
        self.inner.attaches.load(Ordering::SeqCst)
    }
    pub fn sends(&self) -> usize {
        self.inner.sends.load(Ordering::SeqCst)
    }
    /// Closes of (sender, session, connection).
    pub fn closes(&self) -> (usize, usize, usize) {
        (
            self.inner.sender_closes.load(Ordering::SeqCst),
            self.inner.session_ends.load(Ordering::SeqCst),
            self.inner.connection_closes.load(Ordering::SeqCst),
        )
    }
    pub fn live_connections(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }
    pub fn max_live_connections(&self) -> usize {
        self.inner.max_live.load(Ordering::SeqCst)
    }
    /// Messages which the mock broker accepted.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.inner.sent.lock().unwrap().clone()
    }

    fn close_result(&self) -> Result<(), Error> {
        if self.inner.fail_closes.load(Ordering::SeqCst) {
            Err(Error::Close {
                op: crate::Op::CloseConnection,
                source: "peer went away".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;
    type Session = MockSession;
    type Sender = MockSender;

    async fn dial(&self, _endpoint: &BrokerEndpoint) -> Result<MockConnection, Error> {
        self.inner.dials.fetch_add(1, Ordering::SeqCst);

        let delay = *self.inner.dial_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.inner.broker_down.load(Ordering::SeqCst) {
            return Err(Error::Dial("connection refused".into()));
        }

        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(MockConnection {
            live: self.inner.live.clone(),
        })
    }

    async fn begin_session(&self, _connection: &mut MockConnection) -> Result<MockSession, Error> {
        self.inner.sessions.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_sessions.load(Ordering::SeqCst) {
            return Err(Error::Session("session limit reached".into()));
        }
        Ok(MockSession)
    }

    async fn attach_sender(
        &self,
        _session: &mut MockSession,
        address: &str,
    ) -> Result<MockSender, Error> {
        self.inner.attaches.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_attaches.load(Ordering::SeqCst) {
            return Err(Error::Attach {
                address: address.to_string(),
                source: "amqp:not-found".into(),
            });
        }
        Ok(MockSender)
    }

    async fn send(&self, _sender: &mut MockSender, message: &OutboundMessage) -> Result<(), Error> {
        self.inner.sends.fetch_add(1, Ordering::SeqCst);

        if self.inner.hang_sends.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        let failed = self
            .inner
            .fail_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if failed {
            return Err(Error::Send("amqp:connection:forced".into()));
        }
        self.inner.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn close_sender(&self, _sender: MockSender) -> Result<(), Error> {
        self.inner.sender_closes.fetch_add(1, Ordering::SeqCst);
        self.close_result()
    }

    async fn end_session(&self, _session: MockSession) -> Result<(), Error> {
        self.inner.session_ends.fetch_add(1, Ordering::SeqCst);
        self.close_result()
    }

    async fn close_connection(&self, _connection: MockConnection) -> Result<(), Error> {
        self.inner.connection_closes.fetch_add(1, Ordering::SeqCst);
        self.close_result()
    }
}

pub fn endpoint() -> BrokerEndpoint {
    BrokerEndpoint {
        url: url::Url::parse("amqp://127.0.0.1:5672").unwrap(),
        credentials: Credentials {
            username: "user".to_string(),
            password: "secret".to_string(),
        },
        address: "alerts".to_string(),
        timeouts: Timeouts::default(),
    }
}
