//! Runtime configuration for the hub server.

use std::time::Duration;

use bazaar_settings::HubSettings;

/// Configuration for a running hub.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Per-connection outbound queue depth.
    pub send_queue: usize,
    /// Depth of the hub loop's command queue.
    pub command_queue: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Ping sweep period.
    pub heartbeat_interval: Duration,
    /// Invoice expiry sweep period.
    pub expiry_sweep_interval: Duration,
    /// Age after which an unpaid invoice is dropped.
    pub invoice_ttl: Duration,
    /// Base URL of the external balance service.
    pub balance_url: Option<String>,
    /// Timeout for a single balance lookup.
    pub balance_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&HubSettings::default())
    }
}

impl From<&HubSettings> for HubConfig {
    fn from(settings: &HubSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            send_queue: settings.server.send_queue,
            command_queue: 1024,
            max_message_size: settings.server.max_message_size,
            heartbeat_interval: settings.supervisor.heartbeat_interval(),
            expiry_sweep_interval: settings.supervisor.expiry_sweep_interval(),
            invoice_ttl: settings.supervisor.invoice_ttl(),
            balance_url: settings.ledger.balance_url.clone(),
            balance_timeout: Duration::from_millis(settings.ledger.request_timeout_ms),
        }
    }
}
