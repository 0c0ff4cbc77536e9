use alert_bridge::{amqp::Amqp, BrokerEndpoint, ConnectionManager, Credentials, Timeouts};
use anyhow::Context;
use clap::Parser;
use futures::FutureExt;
use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Forwards Alertmanager webhook notifications to an AMQP 1.0 broker,
/// one durable message per alert.
#[derive(Debug, Parser)]
#[command(about, version)]
pub struct Cli {
    /// URL of the AMQP broker. Credentials must not be embedded in the URL.
    #[arg(long = "amqp", env = "AMQP_URL", default_value = "amqp://127.0.0.1:5672")]
    amqp_url: url::Url,
    /// Address to listen on for webhook requests and `/metrics`.
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:2778")]
    listen: SocketAddr,
    /// Default log level. Directives of RUST_LOG take precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,
    /// Target address of the sender link, such as a queue name.
    #[arg(long, env = "AMQP_LINK", default_value = "alerts")]
    link: String,

    /// Username for SASL PLAIN authentication to the broker.
    #[arg(long, env = "AMQP_USER", value_parser = non_empty)]
    amqp_user: String,
    /// Password for SASL PLAIN authentication to the broker.
    #[arg(long, env = "AMQP_PASSWORD", hide_env_values = true, value_parser = parse_password)]
    amqp_password: Password,

    /// Deadline for dialing the broker, beginning a session, or attaching a sender.
    #[arg(long, env = "AMQP_CONNECT_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    connect_timeout: Duration,
    /// Deadline for a single send attempt.
    #[arg(long, env = "AMQP_SEND_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    send_timeout: Duration,
    /// Deadline for closing each of a stale sender, session, and connection.
    #[arg(long, env = "AMQP_CLOSE_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    close_timeout: Duration,
}

#[derive(Clone)]
struct Password(String);

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("can't be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn parse_password(value: &str) -> Result<Password, String> {
    non_empty(value).map(Password)
}

impl Cli {
    fn endpoint(&self) -> anyhow::Result<BrokerEndpoint> {
        if self.amqp_url.password().is_some() || !self.amqp_url.username().is_empty() {
            anyhow::bail!("AMQP credentials must be provided with AMQP_USER and AMQP_PASSWORD, not the broker URL");
        }

        Ok(BrokerEndpoint {
            url: self.amqp_url.clone(),
            credentials: Credentials {
                username: self.amqp_user.clone(),
                password: self.amqp_password.0.clone(),
            },
            address: self.link.clone(),
            timeouts: Timeouts {
                connect: self.connect_timeout,
                send: self.send_timeout,
                close: self.close_timeout,
            },
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(cli.log_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tracing::info!(?cli, "starting alert-bridge");

    let result = runtime.block_on(async_main(cli));

    tracing::info!(?result, "main function completed, shutting down runtime");
    runtime.shutdown_timeout(Duration::from_secs(5));
    result
}

async fn async_main(cli: Cli) -> anyhow::Result<()> {
    let endpoint = cli.endpoint()?;

    let prometheus =
        alert_bridge::metrics_server::install().context("failed to install prometheus recorder")?;

    let manager = Arc::new(ConnectionManager::new(Amqp::new(), endpoint));
    let connecting = manager.spawn_connect();

    let gateway = alert_bridge::DeliveryGateway::new(manager.clone());
    let router = alert_bridge::server::build_router(gateway, prometheus);

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;

    tracing::info!(listen = %cli.listen, "listening for webhook requests");

    // Share-able future which completes when the bridge should exit.
    let shutdown = tokio::signal::ctrl_c().map(|_| ()).shared();

    let serve = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .into_future();
    let (served, ()) = futures::future::join(serve, log_initial_connect(connecting, &manager)).await;
    served?;

    manager.close().await;
    Ok(())
}

/// Log the outcome of the initial connection, which runs alongside the server.
async fn log_initial_connect(
    task: tokio::task::JoinHandle<()>,
    manager: &ConnectionManager<Amqp>,
) {
    match task.await {
        Ok(()) if manager.is_up() => tracing::debug!("initial AMQP connection established"),
        Ok(()) => tracing::warn!("initial AMQP connection failed; will reconnect on demand"),
        Err(err) => tracing::error!(error = ?err, "initial AMQP connection task failed"),
    }
}
