//! C3 — router: the thin `Pick`-only facade handed to protocol demuxers.
//!
//! Grounded on `synctv-cluster::discovery::load_balancer::LoadBalancer`,
//! which wraps a registry behind a narrower selection API; here the
//! selection policy itself lives in the backend (spec.md §4.1), so the
//! router's only job is to hold the shared `Arc` and forward the call.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::StateBackend;
use crate::descriptor::BackendDescriptor;
use crate::error::Result;

/// Resolves a stream URL to a backend descriptor via whichever
/// `StateBackend` the proxy was configured with.
pub struct Router {
    backend: Arc<dyn StateBackend>,
}

impl Router {
    #[must_use]
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend }
    }

    pub async fn pick(&self, stream_url: &str, cancel: &CancellationToken) -> Result<BackendDescriptor> {
        self.backend.pick(stream_url, cancel).await
    }
}
