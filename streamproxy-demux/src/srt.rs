//! SRT stream-id parsing (spec.md §4.6 / scenario 5).
//!
//! The stream-id is a `#!::`-prefixed comma-separated `key=value` list; we
//! only need `h` (host, optional) and `r` (resource, mandatory).

use streamproxy_core::error::{Error, Result};

const PREFIX: &str = "#!::";

#[derive(Debug)]
pub struct StreamId {
    pub host: Option<String>,
    pub resource: String,
}

pub fn parse_stream_id(raw: &str) -> Result<StreamId> {
    let body = raw
        .strip_prefix(PREFIX)
        .ok_or_else(|| Error::ProtocolError(format!("srt stream-id missing {PREFIX} prefix: {raw:?}")))?;

    let mut host = None;
    let mut resource = None;

    for pair in body.split(',') {
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "h" => host = Some(value.to_string()),
            "r" => resource = Some(value.to_string()),
            _ => {}
        }
    }

    let resource = resource.ok_or_else(|| Error::ProtocolError(format!("srt stream-id missing r=: {raw:?}")))?;
    Ok(StreamId { host, resource })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_resource() {
        let id = parse_stream_id("#!::h=example.com,r=live/livestream,m=request").unwrap();
        assert_eq!(id.host.as_deref(), Some("example.com"));
        assert_eq!(id.resource, "live/livestream");
    }

    #[test]
    fn missing_resource_is_protocol_error() {
        let err = parse_stream_id("#!::m=request").unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn missing_prefix_is_protocol_error() {
        let err = parse_stream_id("h=example.com,r=live/s").unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn host_is_optional() {
        let id = parse_stream_id("#!::r=live/solo").unwrap();
        assert_eq!(id.host, None);
        assert_eq!(id.resource, "live/solo");
    }
}
