//! Routing core of the stream proxy: backend descriptors, the state
//! backend trait and its `Local`/`Redis` variants, the stateless router
//! and the session tracker facade (spec.md §4.1-§4.3).

pub mod backend;
pub mod descriptor;
pub mod error;
pub mod router;
pub mod session;
pub mod session_tracker;

pub use backend::{DefaultBackendConfig, LocalBackend, RedisBackend, RedisBackendConfig, StateBackend};
pub use descriptor::{BackendDescriptor, ListenEndpoint};
pub use error::{Error, Result};
pub use router::Router;
pub use session::{HlsSession, SessionRecord, WebRtcSession};
pub use session_tracker::SessionTracker;
