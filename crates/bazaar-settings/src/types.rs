//! Settings types. JSON keys are camelCase; every section falls back to its
//! defaults for missing keys.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    pub server: ServerSettings,
    pub supervisor: SupervisorSettings,
    pub ledger: LedgerSettings,
    pub logging: LoggingSettings,
}

impl HubSettings {
    /// Reject combinations the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.send_queue == 0 {
            return Err(SettingsError::InvalidValue("server.sendQueue must be positive".into()));
        }
        if self.supervisor.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "supervisor.heartbeatIntervalSecs must be positive".into(),
            ));
        }
        if self.supervisor.expiry_sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "supervisor.expirySweepIntervalSecs must be positive".into(),
            ));
        }
        if self.supervisor.invoice_ttl_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "supervisor.invoiceTtlSecs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Network settings for the WebSocket gateway and HTTP side-channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Per-connection outbound queue depth.
    pub send_queue: usize,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            send_queue: 256,
            max_message_size: 64 * 1024,
        }
    }
}

/// Liveness and expiry sweep schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupervisorSettings {
    pub heartbeat_interval_secs: u64,
    pub expiry_sweep_interval_secs: u64,
    pub invoice_ttl_secs: u64,
}

impl SupervisorSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }

    pub fn invoice_ttl(&self) -> Duration {
        Duration::from_secs(self.invoice_ttl_secs)
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            expiry_sweep_interval_secs: 300,
            invoice_ttl_secs: 600,
        }
    }
}

/// External balance service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSettings {
    /// Base URL of the balance service; balances are not resolved when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            balance_url: None,
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter. `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
