//! Literal end-to-end scenarios from spec.md §8 for the HTTP and SRT
//! demultiplexers.

use streamproxy_demux::{canonicalize_http, parse_stream_id, DEFAULT_VHOST};

#[test]
fn http_literal_ip_host_canonicalises_to_default_vhost() {
    let (url, ext) = canonicalize_http("http", "10.0.0.5:8080", "/live/stream.m3u8", None).unwrap();
    assert_eq!(url, format!("http://{DEFAULT_VHOST}/live/stream"));
    assert_eq!(ext, ".m3u8");
}

#[test]
fn http_domain_host_is_preserved() {
    let (url, ext) = canonicalize_http("http", "edge.example.com:8080", "/live/stream.m3u8", None).unwrap();
    assert_eq!(url, "http://edge.example.com/live/stream");
    assert_eq!(ext, ".m3u8");
}

#[test]
fn srt_stream_id_with_resource_parses_host_and_resource() {
    let id = parse_stream_id("#!::h=example.com,r=live/livestream,m=request").unwrap();
    assert_eq!(id.host.as_deref(), Some("example.com"));
    assert_eq!(id.resource, "live/livestream");
}

#[test]
fn srt_stream_id_without_resource_is_a_protocol_error() {
    let err = parse_stream_id("#!::m=request").unwrap_err();
    assert!(matches!(err, streamproxy_core::Error::ProtocolError(_)));
}
