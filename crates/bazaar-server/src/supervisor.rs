//! Periodic liveness and invoice-expiry sweeps.
//!
//! The supervisor owns no state. Each timer only posts a command to the hub
//! loop, which performs the sweep in order with all other traffic.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::hub::{HubCommand, HubHandle};

/// The two sweep timers.
pub struct Supervisor {
    heartbeat: JoinHandle<()>,
    expiry: JoinHandle<()>,
}

impl Supervisor {
    /// Start both timers. They stop when `cancel` fires or the hub goes away.
    pub fn spawn(
        hub: HubHandle,
        heartbeat_interval: Duration,
        expiry_sweep_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let heartbeat = spawn_ticker(
            "heartbeat",
            hub.clone(),
            heartbeat_interval,
            cancel.clone(),
            || HubCommand::HeartbeatSweep,
        );
        let expiry = spawn_ticker(
            "expiry",
            hub,
            expiry_sweep_interval,
            cancel,
            || HubCommand::ExpirySweep,
        );
        Self { heartbeat, expiry }
    }

    pub fn into_tasks(self) -> [JoinHandle<()>; 2] {
        [self.heartbeat, self.expiry]
    }
}

fn spawn_ticker(
    name: &'static str,
    hub: HubHandle,
    every: Duration,
    cancel: CancellationToken,
    command: fn() -> HubCommand,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; sweeps start one period in.
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if hub.send(command()).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(timer = name, "sweep timer stopped");
    })
}
