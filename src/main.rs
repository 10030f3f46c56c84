use agents_coop_mcp::{server, Config, MailboxServer, Registry};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;

    let shutdown = CancellationToken::new();
    let registry = Arc::new(Registry::new(config.capacity, shutdown.clone()));
    let server = MailboxServer::new(Arc::clone(&registry), config.default_wait());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        capacity = config.capacity,
        get_timeout = ?config.default_wait(),
        "Agents coop MCP server listening on http://{}/mcp",
        addr
    );

    tokio::spawn(server::cancel_on_signal(shutdown.clone()));

    server::serve(listener, server, shutdown).await?;

    let backlog = registry.backlog().unwrap_or_default();
    tracing::info!(
        pending = registry.pending_count().unwrap_or_default(),
        mailboxes = registry.mailbox_count().unwrap_or_default(),
        queued = backlog.queued,
        backlogged_agents = backlog.agents,
        "Shutdown complete"
    );

    Ok(())
}
