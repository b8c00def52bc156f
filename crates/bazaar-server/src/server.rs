use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use bazaar_ledger::Ledger;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::balance::BalanceSource;
use crate::config::HubConfig;
use crate::http;
use crate::hub::{Hub, HubHandle};
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::supervisor::Supervisor;
use crate::websocket;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub config: Arc<HubConfig>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .merge(http::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Start the hub loop, the sweep timers and the HTTP listener.
pub async fn start(
    config: HubConfig,
    balances: Option<Arc<dyn BalanceSource>>,
) -> Result<ServerHandle, std::io::Error> {
    let mut shutdown = ShutdownCoordinator::new();

    let (hub, hub_task) = Hub::spawn(
        Ledger::new(config.invoice_ttl),
        balances,
        config.command_queue,
        shutdown.token(),
    );
    shutdown.track("hub", hub_task);

    let [heartbeat, expiry] = Supervisor::spawn(
        hub.clone(),
        config.heartbeat_interval,
        config.expiry_sweep_interval,
        shutdown.token(),
    )
    .into_tasks();
    shutdown.track("heartbeat", heartbeat);
    shutdown.track("expiry", expiry);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;

    let router = build_router(AppState {
        hub: hub.clone(),
        config: Arc::new(config),
    });
    let token = shutdown.token();
    shutdown.track(
        "http",
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                warn!(error = %e, "http server stopped with error");
            }
        }),
    );

    info!(addr = %local_addr, "bazaar hub started");

    Ok(ServerHandle {
        addr: local_addr,
        hub,
        shutdown,
    })
}

/// Handle returned by [`start`]. Dropping it leaves the server running;
/// call [`ServerHandle::shutdown`] to stop it.
pub struct ServerHandle {
    addr: SocketAddr,
    hub: HubHandle,
    shutdown: ShutdownCoordinator,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Stop accepting connections, close every socket and wait for the
    /// background tasks.
    pub async fn shutdown(self, timeout: Option<Duration>) -> ShutdownReport {
        info!("bazaar hub shutting down");
        let report = self.shutdown.graceful_shutdown(timeout).await;
        info!(completed = report.completed, aborted = report.aborted, "bazaar hub stopped");
        report
    }
}
