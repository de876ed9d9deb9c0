//! Composition root: loads configuration, wires C2 (state backend), C5
//! (registration endpoint) and C7 (default-backend keepalive) into one
//! running process, and drives graceful shutdown.
//!
//! Grounded on `synctv::main`'s orchestration shape (config load, logging
//! init, construct services, serve, await shutdown signal).

mod config;
mod logging;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use config::{Config, LoadBalancerType};
use streamproxy_core::backend::{LocalBackend, RedisBackend};
use streamproxy_core::{ListenEndpoint, StateBackend};

/// Host label used only for log context, the way `synctv::generate_node_id`
/// derives an instance identity from the hostname as a fallback.
fn host_label() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Bind a UDP socket on `endpoint` and classify every datagram that arrives
/// via C6 (`streamproxy-demux`), logging the result. The routing decision
/// this would feed (C3/C4) and the actual byte forwarding are both
/// out of scope (spec.md §1) -- this task only proves the demux chain is
/// live in the running process.
async fn spawn_udp_classifier(name: &'static str, endpoint: &str, cancel: CancellationToken) -> anyhow::Result<()> {
    let listen: ListenEndpoint = endpoint.parse()?;
    let socket = tokio::net::UdpSocket::bind(("0.0.0.0", listen.port)).await?;
    info!(name, port = listen.port, "udp classifier listening");

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(name, "udp classifier stopping");
                    return;
                }
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, peer)) => match streamproxy_demux::classify_udp_packet(&buf[..n]) {
                            Some(kind) => debug!(name, %peer, ?kind, "classified udp packet"),
                            None => debug!(name, %peer, "udp packet too short to classify"),
                        },
                        Err(err) => warn!(name, error = %err, "udp recv failed"),
                    }
                }
            }
        }
    });

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(std::env::var("PROXY_CONFIG_FILE").ok().as_deref())?;
    logging::init(&config)?;

    let proxy_pid = std::process::id().to_string();
    info!(host = %host_label(), pid = %proxy_pid, "starting streamproxy");

    let backend: Arc<dyn StateBackend> = match config.load_balancer_type {
        LoadBalancerType::Memory => Arc::new(LocalBackend::new()),
        LoadBalancerType::Redis => Arc::new(RedisBackend::new(&config.redis_backend_config())?),
    };

    let cancel = CancellationToken::new();

    spawn_udp_classifier("webrtc", &config.webrtc_server, cancel.clone()).await?;
    spawn_udp_classifier("srt", &config.srt_server, cancel.clone()).await?;

    let default_backend_config = config.default_backend_config();
    let registered_default = backend.initialize(Some(&default_backend_config), &cancel).await?;
    if let Some(descriptor) = registered_default {
        streamproxy_api::keepalive::spawn(backend.clone(), descriptor, cancel.clone());
    }

    let register_state = streamproxy_api::RegisterState::new(backend.clone(), proxy_pid, cancel.clone());
    let app = streamproxy_api::register_router(register_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_api)).await?;
    info!(addr = %listener.local_addr()?, "registration endpoint listening");

    let shutdown_cancel = cancel.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        shutdown_cancel.cancel();
    });

    if let Err(err) = server.await {
        error!(error = %err, "registration server exited with error");
    }

    info!("streamproxy shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
