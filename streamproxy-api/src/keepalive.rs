//! C7 — default-backend keepalive: a background task that re-registers a
//! synthetic descriptor on a fixed cadence (spec.md §4.5).
//!
//! Grounded on `synctv-core::service::stun::StunServer::start`'s
//! `tokio::spawn`-a-background-loop pattern, with the cadence constant
//! named the way `synctv-cluster`'s heartbeat timeouts are.
//!
//! The descriptor itself is built and first-registered by
//! `StateBackend::initialize` (C2); this task only keeps re-registering
//! the descriptor it is handed.

use std::sync::Arc;

use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use streamproxy_core::descriptor::BackendDescriptor;
use streamproxy_core::StateBackend;

/// How often the default backend's descriptor is re-registered.
const KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Spawn a task that re-registers `descriptor` every
/// `KEEPALIVE_INTERVAL_SECS` until `cancel` fires. Intended for
/// development only (spec.md §4.5).
pub fn spawn(backend: Arc<dyn StateBackend>, descriptor: BackendDescriptor, cancel: CancellationToken) {
    info!(server_id = %descriptor.server_id, "default backend keepalive started");

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECS));
        ticker.tick().await; // first tick fires immediately; initialize() already registered once

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("default backend keepalive stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = backend.update(descriptor.clone(), &cancel).await {
                        warn!(error = %err, "default backend keepalive update failed");
                    }
                }
            }
        }
    });
}
