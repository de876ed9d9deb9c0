//! HTTP-facing surface of the stream proxy: the registration endpoint (C5)
//! and the default-backend keepalive task (C7).

pub mod keepalive;
pub mod register;

pub use register::{router as register_router, RegisterRequest, RegisterState};
