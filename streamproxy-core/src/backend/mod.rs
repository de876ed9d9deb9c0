//! C2 — state backend: the trait shared by the `Local` (single-proxy) and
//! `Redis` (multi-proxy) variants, plus the capability set they expose.

mod local;
mod redis_backend;

pub use local::LocalBackend;
pub use redis_backend::{RedisBackend, RedisBackendConfig};

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::descriptor::BackendDescriptor;
use crate::error::{Error, Result};
use crate::session::{HlsSession, WebRtcSession};

/// Configuration for the optional synthetic debug backend (C7). IP and an
/// RTMP endpoint are mandatory whenever it is enabled; the rest are
/// optional, mirroring the other per-protocol endpoint lists on
/// `BackendDescriptor`.
#[derive(Debug, Clone, Default)]
pub struct DefaultBackendConfig {
    pub enabled: bool,
    pub ip: Option<IpAddr>,
    pub rtmp: Option<String>,
    pub http: Option<String>,
    pub api: Option<String>,
    pub rtc: Option<String>,
    pub srt: Option<String>,
}

impl DefaultBackendConfig {
    /// Build the synthetic descriptor this configuration describes,
    /// generating a fresh `server_id`/`service_id` pair. Fails with
    /// `ConfigInvalid` if enabled but missing IP or an RTMP endpoint.
    pub fn build_descriptor(&self, pid: String) -> Result<BackendDescriptor> {
        if !self.enabled {
            return Err(Error::ConfigInvalid("default backend is not enabled".to_string()));
        }
        let ip = self
            .ip
            .ok_or_else(|| Error::ConfigInvalid("default backend enabled but missing ip".to_string()))?;
        let rtmp = self
            .rtmp
            .clone()
            .ok_or_else(|| Error::ConfigInvalid("default backend enabled but missing rtmp endpoint".to_string()))?;

        Ok(BackendDescriptor {
            server_id: format!("default-{}", nanoid::nanoid!(8)),
            service_id: format!("default-{}", nanoid::nanoid!(8)),
            pid,
            ip,
            rtmp: vec![rtmp],
            http: self.http.clone().into_iter().collect(),
            api: self.api.clone().into_iter().collect(),
            srt: self.srt.clone().into_iter().collect(),
            rtc: self.rtc.clone().into_iter().collect(),
            device_id: Some("default-backend".to_string()),
            updated_at: Utc::now(),
        })
    }
}

/// Polymorphic over `{Initialize, Update, Pick, LoadOrStoreHLS,
/// LoadHLSBySegmentID, StoreWebRTC, LoadWebRTCByUfrag}` (spec.md §4.1).
///
/// Every operation accepts an ambient cancellation token; implementations
/// must release locks/connections promptly and return `Error::Cancelled`
/// when the token fires mid-operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Establish any external connection and verify reachability. When
    /// `default_backend` is `Some` and enabled, validates it, constructs the
    /// synthetic descriptor and performs its first registration, returning
    /// it so the caller (C7) can keep re-registering it on a 30s cadence.
    async fn initialize<'a>(
        &'a self,
        default_backend: Option<&'a DefaultBackendConfig>,
        cancel: &'a CancellationToken,
    ) -> Result<Option<BackendDescriptor>>;

    /// Store/refresh the descriptor under key `id()`; `updated_at` is set to
    /// now by the caller before this is invoked. Idempotent.
    async fn update(&self, descriptor: BackendDescriptor, cancel: &CancellationToken) -> Result<()>;

    /// Resolve a stream URL to a backend descriptor, honoring stickiness.
    async fn pick(&self, stream_url: &str, cancel: &CancellationToken) -> Result<BackendDescriptor>;

    /// If no HLS record is indexed under `stream_url`, store the supplied
    /// one and index it under both `stream_url` and `record.spbhid()`.
    /// Otherwise return the existing record unchanged. Refreshes TTL on the
    /// winning record either way.
    async fn load_or_store_hls(
        &self,
        stream_url: &str,
        record: HlsSession,
        cancel: &CancellationToken,
    ) -> Result<HlsSession>;

    async fn load_hls_by_segment_id(&self, spbhid: &str, cancel: &CancellationToken) -> Result<HlsSession>;

    /// Unconditionally write both indices (URL and ufrag) with refreshed TTL.
    async fn store_webrtc(
        &self,
        stream_url: &str,
        record: WebRtcSession,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn load_webrtc_by_ufrag(&self, ufrag: &str, cancel: &CancellationToken) -> Result<WebRtcSession>;
}
