//! `Local` state backend: in-process mappings for a single proxy instance.
//!
//! Grounded on `synctv-cluster::discovery::node_registry::NodeRegistry`'s
//! local-only mode (`Arc<RwLock<HashMap<...>>>`), generalized here to a
//! concurrent map (`DashMap`) so independent keys never block each other,
//! per spec.md §5's "no operation requires a global lock."

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::prelude::IndexedRandom;
use tokio_util::sync::CancellationToken;

use crate::descriptor::BackendDescriptor;
use crate::error::{Error, Result};
use crate::session::{HlsSession, SESSION_TTL_SECS, WebRtcSession};

use super::{DefaultBackendConfig, StateBackend};

struct TtlEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T: Clone> TtlEntry<T> {
    fn fresh(value: T) -> Self {
        Self {
            value,
            expires_at: Utc::now() + chrono::Duration::seconds(SESSION_TTL_SECS),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Single-proxy state backend: descriptor registry, routing table and
/// session indices held entirely in process memory.
#[derive(Default)]
pub struct LocalBackend {
    registry: DashMap<String, BackendDescriptor>,
    routing: DashMap<String, String>,
    hls_by_url: DashMap<String, TtlEntry<HlsSession>>,
    hls_by_id: DashMap<String, TtlEntry<HlsSession>>,
    rtc_by_url: DashMap<String, TtlEntry<WebRtcSession>>,
    rtc_by_ufrag: DashMap<String, TtlEntry<WebRtcSession>>,
}

impl LocalBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct backends currently registered.
    #[must_use]
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Pick a uniformly random descriptor from the given candidate set.
    fn choose_random(candidates: &[BackendDescriptor]) -> Option<BackendDescriptor> {
        candidates.choose(&mut rand::rng()).cloned()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn initialize<'a>(
        &'a self,
        default_backend: Option<&'a DefaultBackendConfig>,
        cancel: &'a CancellationToken,
    ) -> Result<Option<BackendDescriptor>> {
        Self::check_cancelled(cancel)?;
        let Some(config) = default_backend else {
            return Ok(None);
        };
        if !config.enabled {
            return Ok(None);
        }
        let descriptor = config.build_descriptor(std::process::id().to_string())?;
        self.update(descriptor.clone(), cancel).await?;
        Ok(Some(descriptor))
    }

    async fn update(&self, mut descriptor: BackendDescriptor, cancel: &CancellationToken) -> Result<()> {
        Self::check_cancelled(cancel)?;
        descriptor.updated_at = Utc::now();
        self.registry.insert(descriptor.id(), descriptor);
        Ok(())
    }

    async fn pick(&self, stream_url: &str, cancel: &CancellationToken) -> Result<BackendDescriptor> {
        Self::check_cancelled(cancel)?;

        // Step 1: stickiness. A routing record pins `stream_url` to a
        // backend id as long as that backend still exists in the registry,
        // regardless of current liveness.
        if let Some(existing_id) = self.routing.get(stream_url).map(|r| r.clone()) {
            if let Some(descriptor) = self.registry.get(&existing_id) {
                return Ok(descriptor.clone());
            }
            // Routing record is stale: the backend vanished. Per spec.md §9,
            // "pick anew" -- fall through instead of failing.
        }

        if self.registry.is_empty() {
            return Err(Error::NoBackendAvailable);
        }

        let now = Utc::now();
        let alive: Vec<BackendDescriptor> = self
            .registry
            .iter()
            .filter(|entry| entry.value().is_alive_at(now))
            .map(|entry| entry.value().clone())
            .collect();

        let selected = if !alive.is_empty() {
            Self::choose_random(&alive)
        } else {
            let all: Vec<BackendDescriptor> = self.registry.iter().map(|e| e.value().clone()).collect();
            Self::choose_random(&all)
        };

        let selected = selected.ok_or(Error::NoBackendAvailable)?;
        self.routing.insert(stream_url.to_string(), selected.id());
        Ok(selected)
    }

    async fn load_or_store_hls(
        &self,
        stream_url: &str,
        record: HlsSession,
        cancel: &CancellationToken,
    ) -> Result<HlsSession> {
        Self::check_cancelled(cancel)?;

        if let Some(existing) = self.hls_by_url.get(stream_url) {
            if !existing.is_expired() {
                let value = existing.value.clone();
                drop(existing);
                let refreshed = TtlEntry::fresh(value.clone());
                self.hls_by_url.insert(stream_url.to_string(), refreshed);
                self.hls_by_id.insert(value.spbhid().to_string(), TtlEntry::fresh(value.clone()));
                return Ok(value);
            }
        }

        // URL index written before the secondary index (spec.md §5 ordering
        // guarantee): a reader who observes the URL entry will see the
        // spbhid entry on a retry.
        self.hls_by_url.insert(stream_url.to_string(), TtlEntry::fresh(record.clone()));
        self.hls_by_id.insert(record.spbhid().to_string(), TtlEntry::fresh(record.clone()));
        Ok(record)
    }

    async fn load_hls_by_segment_id(&self, spbhid: &str, cancel: &CancellationToken) -> Result<HlsSession> {
        Self::check_cancelled(cancel)?;
        match self.hls_by_id.get(spbhid) {
            Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
            _ => Err(Error::SessionNotFound(spbhid.to_string())),
        }
    }

    async fn store_webrtc(
        &self,
        stream_url: &str,
        record: WebRtcSession,
        cancel: &CancellationToken,
    ) -> Result<()> {
        Self::check_cancelled(cancel)?;
        self.rtc_by_url.insert(stream_url.to_string(), TtlEntry::fresh(record.clone()));
        self.rtc_by_ufrag.insert(record.ufrag().to_string(), TtlEntry::fresh(record));
        Ok(())
    }

    async fn load_webrtc_by_ufrag(&self, ufrag: &str, cancel: &CancellationToken) -> Result<WebRtcSession> {
        Self::check_cancelled(cancel)?;
        match self.rtc_by_ufrag.get(ufrag) {
            Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
            _ => Err(Error::SessionNotFound(ufrag.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(server: &str, pid: &str) -> BackendDescriptor {
        BackendDescriptor {
            server_id: server.to_string(),
            service_id: "svc".to_string(),
            pid: pid.to_string(),
            ip: "10.0.0.1".parse().unwrap(),
            rtmp: vec!["1935".to_string()],
            http: vec![],
            api: vec![],
            srt: vec![],
            rtc: vec![],
            device_id: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn pick_is_sticky_across_repeated_calls() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        backend.update(descriptor("A", "1"), &cancel).await.unwrap();

        let url = "rtmp://__defaultVhost__/live/stream";
        let first = backend.pick(url, &cancel).await.unwrap();
        for _ in 0..3 {
            let again = backend.pick(url, &cancel).await.unwrap();
            assert_eq!(again.id(), first.id());
        }
    }

    #[tokio::test]
    async fn pick_fails_when_registry_empty() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let err = backend.pick("rtmp://__defaultVhost__/live/s", &cancel).await.unwrap_err();
        assert!(matches!(err, Error::NoBackendAvailable));
    }

    #[tokio::test]
    async fn pick_falls_back_to_stale_when_nothing_alive() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let mut d = descriptor("A", "1");
        d.updated_at = Utc::now() - chrono::Duration::seconds(301);
        backend.registry.insert(d.id(), d.clone());

        let picked = backend.pick("rtmp://__defaultVhost__/live/s", &cancel).await.unwrap();
        assert_eq!(picked.id(), d.id());
    }

    #[tokio::test]
    async fn pick_prefers_alive_over_stale() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();

        let mut stale = descriptor("A", "1");
        stale.updated_at = Utc::now() - chrono::Duration::seconds(301);
        backend.registry.insert(stale.id(), stale);

        let alive = descriptor("B", "2");
        backend.registry.insert(alive.id(), alive.clone());

        let picked = backend.pick("rtmp://__defaultVhost__/live/unseen", &cancel).await.unwrap();
        assert_eq!(picked.id(), alive.id());
    }

    #[tokio::test]
    async fn pick_anew_when_sticky_target_vanished() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();

        let a = descriptor("A", "1");
        backend.update(a.clone(), &cancel).await.unwrap();
        let url = "rtmp://__defaultVhost__/live/s";
        let picked = backend.pick(url, &cancel).await.unwrap();
        assert_eq!(picked.id(), a.id());

        // A disappears from the registry entirely (e.g. TTL eviction on the
        // shared backend; here simulated directly).
        backend.registry.remove(&a.id());
        let b = descriptor("B", "2");
        backend.update(b.clone(), &cancel).await.unwrap();

        let picked = backend.pick(url, &cancel).await.unwrap();
        assert_eq!(picked.id(), b.id());
    }

    #[tokio::test]
    async fn heartbeat_is_idempotent() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let d = descriptor("A", "1");
        for _ in 0..5 {
            backend.update(d.clone(), &cancel).await.unwrap();
        }
        assert_eq!(backend.registry.len(), 1);
    }

    #[tokio::test]
    async fn hls_dual_index_symmetry() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let record = HlsSession {
            spbhid: "sp-abc".to_string(),
            payload: serde_json::Value::Null,
        };
        let stored = backend
            .load_or_store_hls("http://__defaultVhost__/live/s.m3u8", record.clone(), &cancel)
            .await
            .unwrap();
        assert_eq!(stored, record);

        let by_id = backend.load_hls_by_segment_id("sp-abc", &cancel).await.unwrap();
        assert_eq!(by_id, record);
    }

    #[tokio::test]
    async fn load_or_store_hls_keeps_first_writer() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let url = "http://__defaultVhost__/live/s.m3u8";
        let first = HlsSession {
            spbhid: "sp-1".to_string(),
            payload: serde_json::Value::Null,
        };
        let second = HlsSession {
            spbhid: "sp-2".to_string(),
            payload: serde_json::Value::Null,
        };

        let winner = backend.load_or_store_hls(url, first.clone(), &cancel).await.unwrap();
        assert_eq!(winner, first);

        let winner_again = backend.load_or_store_hls(url, second, &cancel).await.unwrap();
        assert_eq!(winner_again, first);
    }

    #[tokio::test]
    async fn webrtc_dual_index_symmetry() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let record = WebRtcSession {
            ufrag: "abcd".to_string(),
            payload: serde_json::Value::Null,
        };
        backend
            .store_webrtc("http://__defaultVhost__/live/whip", record.clone(), &cancel)
            .await
            .unwrap();

        let by_ufrag = backend.load_webrtc_by_ufrag("abcd", &cancel).await.unwrap();
        assert_eq!(by_ufrag, record);
    }

    #[tokio::test]
    async fn missing_session_is_session_not_found() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let err = backend.load_hls_by_segment_id("nope", &cancel).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn initialize_without_default_backend_is_a_noop() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let result = backend.initialize(None, &cancel).await.unwrap();
        assert!(result.is_none());
        assert!(backend.registry.is_empty());
    }

    #[tokio::test]
    async fn initialize_registers_enabled_default_backend() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        let config = DefaultBackendConfig {
            enabled: true,
            ip: Some("127.0.0.1".parse().unwrap()),
            rtmp: Some("1935".to_string()),
            http: None,
            api: None,
            rtc: None,
            srt: None,
        };
        let registered = backend.initialize(Some(&config), &cancel).await.unwrap();
        let registered = registered.expect("default backend should register");
        assert_eq!(backend.registry.len(), 1);
        assert!(backend.registry.contains_key(&registered.id()));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let backend = LocalBackend::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = backend.update(descriptor("A", "1"), &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
