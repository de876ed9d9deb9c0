//! C4 — session tracker: a thin facade over the HLS/WebRTC operations of
//! the state backend (spec.md §4.3).
//!
//! The dual-index visibility contract itself is enforced by the backend
//! (ordered writes in `LocalBackend`, best-effort eventual writes in
//! `RedisBackend`); this facade adds the bounded-retry tolerance that
//! spec.md §4.3 asks callers of the shared variant to apply when a reader
//! observes one index before the other becomes visible.

use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::backend::StateBackend;
use crate::error::{Error, Result};
use crate::session::{HlsSession, WebRtcSession};

/// How many times `load_hls_by_segment_id`/`load_webrtc_by_ufrag` retry a
/// `SessionNotFound` before giving up, to ride out the shared backend's
/// eventual dual-index visibility window.
const LOOKUP_RETRY_ATTEMPTS: u32 = 3;
const LOOKUP_RETRY_DELAY_MS: u64 = 20;

pub struct SessionTracker {
    backend: Arc<dyn StateBackend>,
}

impl SessionTracker {
    #[must_use]
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend }
    }

    pub async fn load_or_store_hls(
        &self,
        stream_url: &str,
        record: HlsSession,
        cancel: &CancellationToken,
    ) -> Result<HlsSession> {
        self.backend.load_or_store_hls(stream_url, record, cancel).await
    }

    /// Retries briefly on `SessionNotFound` to tolerate the shared
    /// backend's one-sided visibility window between the two index writes.
    pub async fn load_hls_by_segment_id(&self, spbhid: &str, cancel: &CancellationToken) -> Result<HlsSession> {
        let mut last_err = Error::SessionNotFound(spbhid.to_string());
        for attempt in 0..LOOKUP_RETRY_ATTEMPTS {
            match self.backend.load_hls_by_segment_id(spbhid, cancel).await {
                Ok(record) => return Ok(record),
                Err(Error::SessionNotFound(id)) => {
                    last_err = Error::SessionNotFound(id);
                    if attempt + 1 < LOOKUP_RETRY_ATTEMPTS {
                        sleep(Duration::from_millis(LOOKUP_RETRY_DELAY_MS)).await;
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_err)
    }

    pub async fn store_webrtc(
        &self,
        stream_url: &str,
        record: WebRtcSession,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.backend.store_webrtc(stream_url, record, cancel).await
    }

    pub async fn load_webrtc_by_ufrag(&self, ufrag: &str, cancel: &CancellationToken) -> Result<WebRtcSession> {
        let mut last_err = Error::SessionNotFound(ufrag.to_string());
        for attempt in 0..LOOKUP_RETRY_ATTEMPTS {
            match self.backend.load_webrtc_by_ufrag(ufrag, cancel).await {
                Ok(record) => return Ok(record),
                Err(Error::SessionNotFound(id)) => {
                    last_err = Error::SessionNotFound(id);
                    if attempt + 1 < LOOKUP_RETRY_ATTEMPTS {
                        sleep(Duration::from_millis(LOOKUP_RETRY_DELAY_MS)).await;
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_err)
    }
}
