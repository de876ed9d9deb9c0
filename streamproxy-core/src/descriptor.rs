//! C1 — backend descriptor: the immutable-ish record of one origin server's
//! identity and per-protocol endpoints.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Liveness window: a descriptor younger than this is preferred by `Pick`.
pub const SERVER_ALIVE_DURATION_SECS: i64 = 300;

/// One entry of the listen-endpoint grammar (spec.md §4.6):
///
/// - bare decimal port `P` -> `tcp`, any IP, port `P`
/// - `proto://host:port` -> specified protocol, specified host IP (empty
///   host = any), specified port
/// - `proto://port` -> specified protocol, any IP, specified port
/// - legacy `proto:ip:port` (three colon-separated tokens)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenEndpoint {
    pub proto: String,
    pub ip: Option<IpAddr>,
    pub port: u16,
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ip {
            Some(ip) => write!(f, "{}://{}:{}", self.proto, ip, self.port),
            None => write!(f, "{}://{}", self.proto, self.port),
        }
    }
}

impl FromStr for ListenEndpoint {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();

        // bare decimal port
        if let Ok(port) = raw.parse::<u16>() {
            return Ok(ListenEndpoint {
                proto: "tcp".to_string(),
                ip: None,
                port,
            });
        }

        if let Some((proto, rest)) = raw.split_once("://") {
            if proto.is_empty() {
                return Err(Error::ConfigInvalid(format!(
                    "empty protocol in endpoint {raw:?}"
                )));
            }
            // proto://port
            if let Ok(port) = rest.parse::<u16>() {
                return Ok(ListenEndpoint {
                    proto: proto.to_string(),
                    ip: None,
                    port,
                });
            }
            // proto://host:port (empty host = any)
            if let Some((host, port_str)) = rest.rsplit_once(':') {
                let port: u16 = port_str
                    .parse()
                    .map_err(|_| Error::ConfigInvalid(format!("bad port in endpoint {raw:?}")))?;
                let ip = if host.is_empty() {
                    None
                } else {
                    Some(
                        host.parse::<IpAddr>()
                            .map_err(|_| Error::ConfigInvalid(format!("bad host in endpoint {raw:?}")))?,
                    )
                };
                return Ok(ListenEndpoint {
                    proto: proto.to_string(),
                    ip,
                    port,
                });
            }
            return Err(Error::ConfigInvalid(format!("unparseable endpoint {raw:?}")));
        }

        // legacy proto:ip:port
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() == 3 {
            let proto = parts[0];
            let host = parts[1];
            let port: u16 = parts[2]
                .parse()
                .map_err(|_| Error::ConfigInvalid(format!("bad port in endpoint {raw:?}")))?;
            let ip = if host.is_empty() {
                None
            } else {
                Some(
                    host.parse::<IpAddr>()
                        .map_err(|_| Error::ConfigInvalid(format!("bad host in endpoint {raw:?}")))?,
                )
            };
            return Ok(ListenEndpoint {
                proto: proto.to_string(),
                ip,
                port,
            });
        }

        Err(Error::ConfigInvalid(format!("unparseable endpoint {raw:?}")))
    }
}

/// Record of one origin server process's identity and per-protocol listen
/// endpoints (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Stable identity of the server process's host (survives restarts).
    pub server_id: String,
    /// Identity of the current process incarnation (changes on restart).
    pub service_id: String,
    /// OS process id, as a string.
    pub pid: String,
    /// Reachable IPv4/IPv6 address of the backend.
    pub ip: IpAddr,
    /// Non-empty ordered list of RTMP listen endpoints.
    pub rtmp: Vec<String>,
    #[serde(default)]
    pub http: Vec<String>,
    #[serde(default)]
    pub api: Vec<String>,
    #[serde(default)]
    pub srt: Vec<String>,
    #[serde(default)]
    pub rtc: Vec<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BackendDescriptor {
    /// Concatenation that uniquely keys this incarnation in the registry;
    /// two registrations with equal `id()` are the same instance and the
    /// later one supersedes.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}-{}-{}", self.server_id, self.service_id, self.pid)
    }

    /// A descriptor is alive iff `now - updated_at < ServerAliveDuration`.
    #[must_use]
    pub fn is_alive_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.updated_at).num_seconds() < SERVER_ALIVE_DURATION_SECS
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.is_alive_at(Utc::now())
    }

    /// Validate the mandatory fields a registration payload must supply:
    /// `ip` (always present, since the type requires it) and at least one
    /// RTMP endpoint.
    pub fn validate(&self) -> Result<(), Error> {
        if self.rtmp.is_empty() {
            return Err(Error::ConfigInvalid(
                "descriptor must have at least one rtmp endpoint".to_string(),
            ));
        }
        for endpoint in self
            .rtmp
            .iter()
            .chain(&self.http)
            .chain(&self.api)
            .chain(&self.srt)
            .chain(&self.rtc)
        {
            endpoint.parse::<ListenEndpoint>()?;
        }
        Ok(())
    }
}
