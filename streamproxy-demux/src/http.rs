//! HTTP(S) URL canonicalisation (spec.md §4.6).
//!
//! Grounded on the path/extension-splitting conventions exercised in
//! `synctv-stream/tests/path_handling_test.rs` (`split('/')`, suffix
//! trimming, `serde_urlencoded` query parsing), generalized here into the
//! single canonical `scheme://vhost/app/stream` form every demultiplexer
//! input is reduced to.

use percent_encoding::percent_decode_str;
use serde::Deserialize;
use streamproxy_core::error::Result;
use url::Host;

pub const DEFAULT_VHOST: &str = "__defaultVhost__";

#[derive(Debug, Deserialize, Default)]
struct AppStreamQuery {
    app: Option<String>,
    stream: Option<String>,
}

/// Strip the port from a `Host` header value and replace the host with
/// [`DEFAULT_VHOST`] when it is a literal IP or carries no dot.
fn canonical_vhost(host_header: &str) -> String {
    let host = host_header.split(':').next().unwrap_or(host_header);
    match Host::parse(host) {
        Ok(Host::Domain(domain)) if domain.contains('.') => domain,
        _ => DEFAULT_VHOST.to_string(),
    }
}

/// Split `path` into (stream_path, extension) at the final `.`, if any.
/// `stream_path` never includes the extension; `extension` includes the
/// leading dot, or is empty when the path carries none.
fn split_extension(path: &str) -> (String, String) {
    match path.rfind('.') {
        Some(idx) if path[idx..].len() > 1 && !path[idx + 1..].contains('/') => {
            (path[..idx].to_string(), path[idx..].to_string())
        }
        _ => (path.to_string(), String::new()),
    }
}

/// Canonicalise one HTTP(S) request into `(stream_url, extension)` per
/// spec.md §4.6 / scenario 6.
pub fn canonicalize(scheme: &str, host_header: &str, path: &str, query: Option<&str>) -> Result<(String, String)> {
    let vhost = canonical_vhost(host_header);
    let path = percent_decode_str(path).decode_utf8_lossy();

    let query: AppStreamQuery = match query {
        Some(q) if !q.is_empty() => serde_urlencoded::from_str(q).unwrap_or_default(),
        _ => AppStreamQuery::default(),
    };

    let (stream_path, extension) = if query.app.is_some() || query.stream.is_some() {
        let app = query.app.unwrap_or_default();
        let stream = query.stream.unwrap_or_default();
        (format!("/{app}/{stream}"), String::new())
    } else {
        split_extension(&path)
    };

    Ok((format!("{scheme}://{vhost}{stream_path}"), extension))
}
