use crate::tools::MailboxServer;
use axum::{routing::get, Json, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Builds the HTTP app: the MCP endpoint at `/mcp` and a `/ping` probe.
///
/// Cancelling `shutdown` also closes open MCP session streams, which would
/// otherwise keep graceful shutdown waiting forever.
pub fn router(server: MailboxServer, shutdown: CancellationToken) -> Router {
    let config = StreamableHttpServerConfig {
        cancellation_token: shutdown,
        ..Default::default()
    };
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        config,
    );

    Router::new()
        .route("/ping", get(ping))
        .nest_service("/mcp", service)
}

/// Serves until `shutdown` is cancelled, then drains connections.
pub async fn serve(
    listener: tokio::net::TcpListener,
    server: MailboxServer,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(server, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn ping() -> Json<Value> {
    Json(json!({ "msg": "Pong" }))
}

/// Cancels `token` on SIGINT or SIGTERM. The token is the shutdown signal
/// that releases every blocked `get`.
pub async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
        () = token.cancelled() => return,
    }
    token.cancel();
}
