use std::time::Duration;

/// Static description of the broker and link which alerts are forwarded to.
/// Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct BrokerEndpoint {
    /// URL of the AMQP broker, like `amqp://127.0.0.1:5672`.
    pub url: url::Url,
    /// SASL PLAIN credentials presented when dialing.
    pub credentials: Credentials,
    /// Target address of the sender link (a queue or topic name).
    pub address: String,
    pub timeouts: Timeouts,
}

/// Username and password for SASL PLAIN authentication.
/// The password is redacted from Debug output, so that a Credentials may be logged.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Deadlines applied to each individual broker operation.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Bounds dialing and authenticating, and also beginning a session
    /// and attaching a sender.
    pub connect: Duration,
    /// Bounds a single send attempt.
    pub send: Duration,
    /// Bounds each close of a sender, session, or connection.
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            send: Duration::from_secs(5),
            close: Duration::from_secs(10),
        }
    }
}
