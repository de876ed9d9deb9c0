//! STUN USERNAME → ICE ufrag extraction (spec.md §4.6).
//!
//! Grounded on `synctv-core::service::stun`'s `MessageDecoder::<Attribute>`
//! usage; here we only need to decode far enough to read the USERNAME
//! attribute of an inbound Binding Request, not to answer it.

use bytecodec::DecodeExt;
use stun_codec::rfc5389::attributes::Username;
use stun_codec::rfc5389::Attribute;
use stun_codec::MessageDecoder;

use streamproxy_core::error::{Error, Result};

/// Extract the local ufrag from a STUN packet's USERNAME attribute. Per
/// ICE (RFC 8445 §7.3), USERNAME is `<local-ufrag>:<remote-ufrag>`; we
/// return the portion before the first `:`.
pub fn extract_ufrag(packet: &[u8]) -> Result<String> {
    let mut decoder = MessageDecoder::<Attribute>::new();
    let decoded = decoder
        .decode_from_bytes(packet)
        .map_err(|e| Error::ProtocolError(format!("malformed stun message: {e}")))?;
    let message = decoded.map_err(|_| Error::ProtocolError("broken stun message".to_string()))?;

    let username = message
        .get_attribute::<Username>()
        .ok_or_else(|| Error::ProtocolError("stun message missing USERNAME attribute".to_string()))?;

    let ufrag = username
        .name()
        .split_once(':')
        .map_or(username.name(), |(local, _)| local);
    Ok(ufrag.to_string())
}

/// Classify the first byte of a UDP datagram as STUN per spec.md §4.6.
#[must_use]
pub fn looks_like_stun(first_byte: u8) -> bool {
    first_byte == 0x00 || first_byte == 0x01
}
