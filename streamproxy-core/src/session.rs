//! HLS and WebRTC session records (spec.md §3).
//!
//! Session records are opaque blobs to the caller beyond exposing an index
//! key (`spbhid()` / `ufrag()`). Per the redesign adopted in spec.md §9,
//! they are modeled here as a tagged enum so the shared (Redis) backend can
//! always rehydrate a concrete record from its serialized form, rather than
//! failing with `SessionNotDeserializable` whenever the concrete type isn't
//! known ahead of time.

use serde::{Deserialize, Serialize};

/// TTL applied to HLS/WebRTC session records, refreshed on every store.
pub const SESSION_TTL_SECS: i64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsSession {
    /// Opaque backend-HLS-session identifier embedded in segment URLs.
    pub spbhid: String,
    /// Free-form payload the caller attaches to the session (player state,
    /// backend-chosen parameters, etc).
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl HlsSession {
    #[must_use]
    pub fn spbhid(&self) -> &str {
        &self.spbhid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebRtcSession {
    /// ICE username fragment chosen by the backend during SDP negotiation.
    pub ufrag: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WebRtcSession {
    #[must_use]
    pub fn ufrag(&self) -> &str {
        &self.ufrag
    }
}

/// Tagged union of the two session record kinds, so the shared backend's
/// deserializer never needs to guess which concrete type a blob holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SessionRecord {
    Hls(HlsSession),
    WebRtc(WebRtcSession),
}
