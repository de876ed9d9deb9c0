//! C6 — protocol demultiplexers: derive the canonical stream URL and any
//! protocol-specific session key from whichever wire input arrives
//! (spec.md §4.6). Payload parsing proper (RTMP connect params, RTP/RTCP
//! media dispatch, SRT data framing) stays out of scope; only the
//! URL/session-key derivation shape lives here.

pub mod http;
pub mod srt;
pub mod stun;
pub mod udp;
pub mod webrtc_sdp;

pub use http::{canonicalize as canonicalize_http, DEFAULT_VHOST};
pub use srt::{parse_stream_id, StreamId};
pub use stun::extract_ufrag as extract_stun_ufrag;
pub use udp::{classify as classify_udp_packet, srt_socket_id, PacketKind};
pub use webrtc_sdp::{extract_ice_credentials, IceCredentials};
