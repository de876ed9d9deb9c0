//! `Redis` state backend: the shared variant used when several proxy
//! instances must observe the same registry/routing/session state.
//!
//! Grounded on `synctv-cluster::discovery::node_registry::NodeRegistry`'s
//! cached `MultiplexedConnection` + timeout-wrapped round trips, and on
//! `synctv-stream::relay::registry::StreamRegistry`'s per-key
//! `SETEX`/`EXPIRE` session pattern.

use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::IndexedRandom;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use crate::descriptor::{BackendDescriptor, SERVER_ALIVE_DURATION_SECS};
use crate::error::{Error, Result};
use crate::session::{HlsSession, WebRtcSession, SESSION_TTL_SECS};

use super::{DefaultBackendConfig, StateBackend};

/// Timeout applied to every individual Redis round trip; exceeding it is
/// reported as `Error::BackendUnavailable` (SPEC_FULL.md §15).
const REDIS_ROUND_TRIP_TIMEOUT_SECS: u64 = 5;

/// `Pick` tolerates up to this many attempts at sampling a live server
/// before giving up with `NoBackendAvailable` (spec.md §4.1).
const PICK_MAX_ATTEMPTS: u32 = 3;

const ALL_SERVERS_KEY: &str = "srs-proxy-all-servers";

fn server_key(id: &str) -> String {
    format!("srs-proxy-server:{id}")
}

fn url_key(stream_url: &str) -> String {
    format!("srs-proxy-url:{stream_url}")
}

fn hls_key(stream_url: &str) -> String {
    format!("srs-proxy-hls:{stream_url}")
}

fn spbhid_key(spbhid: &str) -> String {
    format!("srs-proxy-spbhid:{spbhid}")
}

fn rtc_key(stream_url: &str) -> String {
    format!("srs-proxy-rtc:{stream_url}")
}

fn ufrag_key(ufrag: &str) -> String {
    format!("srs-proxy-ufrag:{ufrag}")
}

/// Connection parameters for the shared Redis backend (spec.md §6:
/// `PROXY_REDIS_HOST`/`PORT`/`PASSWORD`/`DB`).
#[derive(Debug, Clone)]
pub struct RedisBackendConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for RedisBackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

impl RedisBackendConfig {
    fn connection_url(&self) -> String {
        let auth = match &self.password {
            Some(password) if !password.is_empty() => format!(":{password}@"),
            _ => String::new(),
        };
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Shared state backend: descriptor registry, routing table and session
/// indices are held in Redis so every proxy instance observes the same
/// state, per spec.md §4.1's key layout table.
pub struct RedisBackend {
    client: redis::Client,
    cached_conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl RedisBackend {
    pub fn new(config: &RedisBackendConfig) -> Result<Self> {
        let client = redis::Client::open(config.connection_url())
            .map_err(|e| Error::ConfigInvalid(format!("invalid redis connection string: {e}")))?;
        Ok(Self {
            client,
            cached_conn: Mutex::new(None),
        })
    }

    /// Get or establish a cached multiplexed connection. `MultiplexedConnection`
    /// pipelines concurrent requests internally and reconnects on its own, so
    /// a single instance is reused across calls.
    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        let mut guard = self.cached_conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = timeout(
            Duration::from_secs(REDIS_ROUND_TRIP_TIMEOUT_SECS),
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| Error::BackendUnavailable("redis connection timed out".to_string()))?
        .map_err(|e| Error::BackendUnavailable(format!("redis connection failed: {e}")))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    async fn with_timeout<T, F>(fut: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, redis::RedisError>>,
    {
        timeout(Duration::from_secs(REDIS_ROUND_TRIP_TIMEOUT_SECS), fut)
            .await
            .map_err(|_| Error::BackendUnavailable("redis round trip timed out".to_string()))?
            .map_err(Error::from)
    }

    /// Remove members of `srs-proxy-all-servers` whose descriptor key no
    /// longer exists, per spec.md's "pruned of dangling entries during
    /// every Update".
    async fn prune_dangling_servers(&self, conn: &mut redis::aio::MultiplexedConnection) -> Result<()> {
        let ids: Vec<String> = Self::with_timeout(conn.smembers(ALL_SERVERS_KEY)).await?;
        if ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = ids.iter().map(|id| server_key(id)).collect();
        let values: Vec<Option<String>> = Self::with_timeout(conn.mget(&keys)).await?;
        let dangling: Vec<&String> = ids
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(id, _)| id)
            .collect();
        if !dangling.is_empty() {
            let _: () = Self::with_timeout(conn.srem(ALL_SERVERS_KEY, &dangling)).await?;
        }
        Ok(())
    }

    /// Sample the full registry: `SMEMBERS` the id set, then `MGET` every
    /// descriptor in one round trip, discarding stale ids that already
    /// vanished (no pruning here -- that happens on `Update`).
    async fn sample_registry(&self, conn: &mut redis::aio::MultiplexedConnection) -> Result<Vec<BackendDescriptor>> {
        let ids: Vec<String> = Self::with_timeout(conn.smembers(ALL_SERVERS_KEY)).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| server_key(id)).collect();
        let values: Vec<Option<String>> = Self::with_timeout(conn.mget(&keys)).await?;
        let descriptors = values
            .into_iter()
            .filter_map(|raw| raw.and_then(|json| serde_json::from_str::<BackendDescriptor>(&json).ok()))
            .collect();
        Ok(descriptors)
    }
}

#[async_trait]
impl StateBackend for RedisBackend {
    async fn initialize<'a>(
        &'a self,
        default_backend: Option<&'a DefaultBackendConfig>,
        cancel: &'a CancellationToken,
    ) -> Result<Option<BackendDescriptor>> {
        Self::check_cancelled(cancel)?;
        let mut conn = self.conn().await?;
        let _: String = Self::with_timeout(redis::cmd("PING").query_async(&mut conn)).await?;

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
        let mut conn = self.conn().await?;

        let json = serde_json::to_string(&descriptor)?;
        let id = descriptor.id();
        let _: () = Self::with_timeout(
            conn.set_ex(server_key(&id), json, SERVER_ALIVE_DURATION_SECS as u64),
        )
        .await?;
        let _: () = Self::with_timeout(conn.sadd(ALL_SERVERS_KEY, &id)).await?;

        self.prune_dangling_servers(&mut conn).await?;
        Ok(())
    }

    async fn pick(&self, stream_url: &str, cancel: &CancellationToken) -> Result<BackendDescriptor> {
        Self::check_cancelled(cancel)?;
        let mut conn = self.conn().await?;

        // Stickiness: a routing record pins the URL to a server id as long
        // as that server's descriptor still exists, regardless of liveness.
        if let Some(existing_id) = Self::with_timeout::<Option<String>, _>(conn.get(url_key(stream_url))).await? {
            let raw: Option<String> = Self::with_timeout(conn.get(server_key(&existing_id))).await?;
            if let Some(json) = raw {
                if let Ok(descriptor) = serde_json::from_str::<BackendDescriptor>(&json) {
                    return Ok(descriptor);
                }
            }
            // Sticky target vanished or is no longer deserializable: per
            // spec.md §9, pick anew instead of failing.
        }

        for _ in 0..PICK_MAX_ATTEMPTS {
            Self::check_cancelled(cancel)?;
            let all = self.sample_registry(&mut conn).await?;
            if all.is_empty() {
                continue;
            }

            let now = Utc::now();
            let alive: Vec<&BackendDescriptor> = all.iter().filter(|d| d.is_alive_at(now)).collect();
            let selected = if !alive.is_empty() {
                alive
                    .as_slice()
                    .choose(&mut rand::rng())
                    .map(|d| (*d).clone())
            } else {
                all.as_slice().choose(&mut rand::rng()).cloned()
            };

            if let Some(selected) = selected {
                let _: () = Self::with_timeout(conn.set(url_key(stream_url), selected.id())).await?;
                return Ok(selected);
            }
        }

        Err(Error::NoBackendAvailable)
    }

    async fn load_or_store_hls(
        &self,
        stream_url: &str,
        record: HlsSession,
        cancel: &CancellationToken,
    ) -> Result<HlsSession> {
        Self::check_cancelled(cancel)?;
        let mut conn = self.conn().await?;

        let existing: Option<String> = Self::with_timeout(conn.get(hls_key(stream_url))).await?;
        if let Some(json) = existing {
            if let Ok(record) = serde_json::from_str::<HlsSession>(&json) {
                let json = serde_json::to_string(&record)?;
                let _: () = Self::with_timeout(
                    conn.set_ex(hls_key(stream_url), json.clone(), SESSION_TTL_SECS as u64),
                )
                .await?;
                let _: () = Self::with_timeout(
                    conn.set_ex(spbhid_key(record.spbhid()), json, SESSION_TTL_SECS as u64),
                )
                .await?;
                return Ok(record);
            }
        }

        // URL index written before the secondary index (spec.md §5 ordering
        // guarantee).
        let json = serde_json::to_string(&record)?;
        let _: () = Self::with_timeout(
            conn.set_ex(hls_key(stream_url), json.clone(), SESSION_TTL_SECS as u64),
        )
        .await?;
        let _: () = Self::with_timeout(
            conn.set_ex(spbhid_key(record.spbhid()), json, SESSION_TTL_SECS as u64),
        )
        .await?;
        Ok(record)
    }

    async fn load_hls_by_segment_id(&self, spbhid: &str, cancel: &CancellationToken) -> Result<HlsSession> {
        Self::check_cancelled(cancel)?;
        let mut conn = self.conn().await?;
        let raw: Option<String> = Self::with_timeout(conn.get(spbhid_key(spbhid))).await?;
        match raw {
            Some(json) => serde_json::from_str(&json)
                .map_err(|_| Error::SessionNotDeserializable(spbhid.to_string())),
            None => Err(Error::SessionNotFound(spbhid.to_string())),
        }
    }

    async fn store_webrtc(
        &self,
        stream_url: &str,
        record: WebRtcSession,
        cancel: &CancellationToken,
    ) -> Result<()> {
        Self::check_cancelled(cancel)?;
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(&record)?;
        let _: () = Self::with_timeout(
            conn.set_ex(rtc_key(stream_url), json.clone(), SESSION_TTL_SECS as u64),
        )
        .await?;
        let _: () = Self::with_timeout(
            conn.set_ex(ufrag_key(record.ufrag()), json, SESSION_TTL_SECS as u64),
        )
        .await?;
        Ok(())
    }

    async fn load_webrtc_by_ufrag(&self, ufrag: &str, cancel: &CancellationToken) -> Result<WebRtcSession> {
        Self::check_cancelled(cancel)?;
        let mut conn = self.conn().await?;
        let raw: Option<String> = Self::with_timeout(conn.get(ufrag_key(ufrag))).await?;
        match raw {
            Some(json) => {
                serde_json::from_str(&json).map_err(|_| Error::SessionNotDeserializable(ufrag.to_string()))
            }
            None => Err(Error::SessionNotFound(ufrag.to_string())),
        }
    }
}
