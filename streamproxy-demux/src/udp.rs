//! UDP packet steering (spec.md §4.6): classify an inbound datagram by its
//! leading bytes before dispatching it to the right protocol path.

/// Outcome of inspecting one UDP datagram's header bytes. The WebRTC/SRT
/// payload handling itself (RTP/RTCP dispatch by 5-tuple, SRT data dispatch
/// by socket id) is out of scope (spec.md §1); this only classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// STUN Binding Request/Response -- route to the WebRTC ufrag lookup.
    Stun,
    /// Existing WebRTC media session, dispatched by 5-tuple (out of scope).
    RtpRtcp,
    /// SRT handshake packet carrying a stream-id to parse.
    SrtHandshake,
    /// SRT data packet, dispatched by socket id (out of scope).
    SrtData,
}

const SRT_HANDSHAKE_MARKER: u32 = 0x8000_0000;

/// Classify one datagram per spec.md §4.6's byte-pattern rules, checked in
/// the order the spec lists them.
#[must_use]
pub fn classify(packet: &[u8]) -> Option<PacketKind> {
    let first = *packet.first()?;
    if first == 0x00 || first == 0x01 {
        return Some(PacketKind::Stun);
    }
    if packet.len() >= 12 && (first & 0xC0) == 0x80 {
        return Some(PacketKind::RtpRtcp);
    }
    if packet.len() >= 4 {
        let header = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]);
        if header == SRT_HANDSHAKE_MARKER {
            return Some(PacketKind::SrtHandshake);
        }
    }
    Some(PacketKind::SrtData)
}

/// Extract the SRT socket id used to dispatch data packets, per spec.md
/// §4.6 (`bytes[12:16]`). Returns `None` if the packet is too short.
#[must_use]
pub fn srt_socket_id(packet: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = packet.get(12..16)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_stun_by_first_byte() {
        assert_eq!(classify(&[0x00, 0, 0, 0]), Some(PacketKind::Stun));
        assert_eq!(classify(&[0x01, 0, 0, 0]), Some(PacketKind::Stun));
    }

    #[test]
    fn classifies_rtp_rtcp_by_version_bits() {
        let mut packet = vec![0x80u8; 12];
        packet[0] = 0x80;
        assert_eq!(classify(&packet), Some(PacketKind::RtpRtcp));
    }

    #[test]
    fn classifies_srt_handshake_by_marker() {
        let packet = [0x80, 0x00, 0x00, 0x00, 0, 0, 0, 0];
        assert_eq!(classify(&packet), Some(PacketKind::SrtHandshake));
    }

    #[test]
    fn short_rtp_like_packet_falls_through_to_srt_data() {
        // len < 12 disqualifies the RTP/RTCP branch even with 0x80 leading byte.
        let packet = [0x80, 0x00, 0x00, 0x01];
        assert_eq!(classify(&packet), Some(PacketKind::SrtData));
    }

    #[test]
    fn extracts_srt_socket_id() {
        let mut packet = vec![0u8; 16];
        packet[12..16].copy_from_slice(&42u32.to_be_bytes());
        assert_eq!(srt_socket_id(&packet), Some(42));
    }

    #[test]
    fn empty_packet_has_no_classification() {
        assert_eq!(classify(&[]), None);
    }
}
