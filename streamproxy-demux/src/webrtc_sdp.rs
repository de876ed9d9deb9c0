//! WebRTC SDP `ice-ufrag`/`ice-pwd` extraction (spec.md §4.6).

use streamproxy_core::error::{Error, Result};

const UFRAG_PREFIX: &str = "a=ice-ufrag:";
const PWD_PREFIX: &str = "a=ice-pwd:";

#[derive(Debug)]
pub struct IceCredentials {
    pub ufrag: String,
    pub pwd: String,
}

fn find_line_value<'a>(sdp: &'a str, prefix: &str) -> Option<&'a str> {
    sdp.lines().find_map(|line| line.trim().strip_prefix(prefix))
}

pub fn extract_ice_credentials(sdp: &str) -> Result<IceCredentials> {
    let ufrag = find_line_value(sdp, UFRAG_PREFIX)
        .ok_or_else(|| Error::ProtocolError("sdp missing a=ice-ufrag line".to_string()))?;
    let pwd = find_line_value(sdp, PWD_PREFIX)
        .ok_or_else(|| Error::ProtocolError("sdp missing a=ice-pwd line".to_string()))?;
    Ok(IceCredentials {
        ufrag: ufrag.to_string(),
        pwd: pwd.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDP: &str = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\na=ice-ufrag:abcd\r\na=ice-pwd:0123456789abcdef01234567\r\n";

    #[test]
    fn extracts_ufrag_and_pwd() {
        let creds = extract_ice_credentials(SDP).unwrap();
        assert_eq!(creds.ufrag, "abcd");
        assert_eq!(creds.pwd, "0123456789abcdef01234567");
    }

    #[test]
    fn missing_ufrag_is_protocol_error() {
        let sdp = "v=0\r\na=ice-pwd:x\r\n";
        let err = extract_ice_credentials(sdp).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn missing_pwd_is_protocol_error() {
        let sdp = "v=0\r\na=ice-ufrag:x\r\n";
        let err = extract_ice_credentials(sdp).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }
}
