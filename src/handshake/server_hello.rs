use super::client_hello::NamedGroup;
use super::Reader;
use crate::cipher_suites::CipherSuite;
use crate::error::{decode_err, ProtocolError};
use crate::extension::ExtensionType;
use crate::record::TlsVersion;
use log::{debug, error};

/// Decoded ServerHello fields this client acts on.
#[derive(Debug)]
pub(crate) struct ServerHello {
    pub cipher_suite: CipherSuite,
    pub server_public: [u8; 32],
}

/// Decode and validate a ServerHello body.
///
/// # References
///
/// * [RFC 8446 Appendix B.3.1](https://datatracker.ietf.org/doc/html/rfc8446#appendix-B.3.1)
///
/// ```text
/// struct {
///     ProtocolVersion legacy_version = 0x0303;    /* TLS v1.2 */
///     Random random;
///     opaque legacy_session_id_echo<0..32>;
///     CipherSuite cipher_suite;
///     uint8 legacy_compression_method = 0;
///     Extension extensions<6..2^16-1>;
/// } ServerHello;
/// ```
pub(crate) fn parse(body: &[u8], offered: &[CipherSuite]) -> Result<ServerHello, ProtocolError> {
    let mut reader: Reader = Reader::new(body);
    let truncated = || decode_err("ServerHello", "truncated");

    let legacy_version: u16 = reader.next_u16().ok_or_else(truncated)?;
    if legacy_version != u16::from(TlsVersion::V1_2) && legacy_version != u16::from(TlsVersion::V1_3)
    {
        error!("unexpected legacy_version {legacy_version:#06X}");
        return Err(ProtocolError::UnsupportedVersion(legacy_version));
    }

    // random
    reader.skip(32).ok_or_else(truncated)?;

    let session_id_len: u8 = reader.next_u8().ok_or_else(truncated)?;
    if session_id_len > 32 {
        error!("session ID echo length {session_id_len} exceeds 32");
        return Err(decode_err("ServerHello", "oversized session ID echo"));
    }
    reader.skip(session_id_len.into()).ok_or_else(truncated)?;

    let cipher_suite_id: u16 = reader.next_u16().ok_or_else(truncated)?;
    let cipher_suite: CipherSuite = CipherSuite::try_from(cipher_suite_id)
        .map_err(ProtocolError::CipherSuiteNotOffered)?;
    if !offered.contains(&cipher_suite) {
        error!("server selected {cipher_suite:?} which was not offered");
        return Err(ProtocolError::CipherSuiteNotOffered(cipher_suite_id));
    }

    let compression_method: u8 = reader.next_u8().ok_or_else(truncated)?;
    if compression_method != 0 {
        error!("compression method is not 0: {compression_method}");
        return Err(decode_err("ServerHello", "non-null compression method"));
    }

    let extensions_len: usize = reader.next_u16().ok_or_else(truncated)?.into();
    if extensions_len != reader.remaining() {
        error!(
            "extensions length {extensions_len} does not match the {} remaining bytes",
            reader.remaining()
        );
        return Err(decode_err("ServerHello", "bad extensions length"));
    }

    let mut selected_version: Option<u16> = None;
    let mut server_public: Option<[u8; 32]> = None;

    while reader.remaining() != 0 {
        let extension_type: u16 = reader.next_u16().ok_or_else(truncated)?;
        let extension_len: usize = reader.next_u16().ok_or_else(truncated)?.into();
        let extension_start: usize = reader.position();

        match ExtensionType::try_from(extension_type) {
            Ok(ExtensionType::SupportedVersions) => {
                // https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.1
                // A server which negotiates TLS 1.3 MUST respond by sending
                // a "supported_versions" extension containing the selected
                // version value (0x0304).
                let version: u16 = reader.next_u16().ok_or_else(truncated)?;
                if version != u16::from(TlsVersion::V1_3) {
                    error!("server selected version {version:#06X}");
                    return Err(ProtocolError::UnsupportedVersion(version));
                }
                selected_version.replace(version);
            }
            Ok(ExtensionType::KeyShare) => {
                // https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.8
                // KeyShareServerHello: a single KeyShareEntry matching one
                // of the client's shares; the only share we offer is X25519
                let group: u16 = reader.next_u16().ok_or_else(truncated)?;
                if group != NamedGroup::x25519.value() {
                    error!("server key share group {group:#06X} is not x25519");
                    return Err(ProtocolError::UnsupportedGroup(group));
                }
                let key_len: usize = reader.next_u16().ok_or_else(truncated)?.into();
                if key_len != 32 {
                    error!("expected 32 byte X25519 key, got {key_len}");
                    return Err(decode_err("ServerHello", "bad key share length"));
                }
                server_public.replace(reader.next_array().ok_or_else(truncated)?);
            }
            other => {
                // HelloRetryRequest cookies and the like are out of scope;
                // anything unrecognised is skipped, not rejected
                debug!("skipping ServerHello extension {other:?} of {extension_len} bytes");
                reader.skip(extension_len).ok_or_else(truncated)?;
            }
        }

        if reader.position() - extension_start != extension_len {
            error!("extension {extension_type} length mismatch");
            return Err(decode_err("ServerHello", "bad extension length"));
        }
    }

    let server_public: [u8; 32] = server_public.ok_or_else(|| {
        error!("missing key_share extension");
        decode_err("ServerHello", "missing key_share extension")
    })?;
    if selected_version.is_none() {
        error!("missing supported_versions extension");
        return Err(decode_err("ServerHello", "missing supported_versions extension"));
    }

    Ok(ServerHello {
        cipher_suite,
        server_public,
    })
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::cipher_suites::CipherSuite;
    use crate::error::ProtocolError;

    fn sample(cipher_suite: u16, group: u16, version: u16) -> Vec<u8> {
        let mut body: Vec<u8> = Vec::new();
        body.extend_from_slice(&0x0303u16.to_be_bytes());
        body.extend_from_slice(&[0x5A; 32]); // random
        body.push(0); // empty session ID echo
        body.extend_from_slice(&cipher_suite.to_be_bytes());
        body.push(0); // compression

        let mut extensions: Vec<u8> = Vec::new();
        // supported_versions
        extensions.extend_from_slice(&43u16.to_be_bytes());
        extensions.extend_from_slice(&2u16.to_be_bytes());
        extensions.extend_from_slice(&version.to_be_bytes());
        // key_share
        extensions.extend_from_slice(&51u16.to_be_bytes());
        extensions.extend_from_slice(&36u16.to_be_bytes());
        extensions.extend_from_slice(&group.to_be_bytes());
        extensions.extend_from_slice(&32u16.to_be_bytes());
        extensions.extend_from_slice(&[0x77; 32]);

        body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        body.extend_from_slice(&extensions);
        body
    }

    #[test]
    fn accepts_valid_hello() {
        let body: Vec<u8> = sample(0x1301, 0x001D, 0x0304);
        let hello = parse(&body, &CipherSuite::DEFAULTS).unwrap();
        assert_eq!(hello.cipher_suite, CipherSuite::TLS_AES_128_GCM_SHA256);
        assert_eq!(hello.server_public, [0x77; 32]);
    }

    #[test]
    fn rejects_unoffered_suite() {
        let body: Vec<u8> = sample(0x1302, 0x001D, 0x0304);
        assert_eq!(
            parse(&body, &[CipherSuite::TLS_AES_128_GCM_SHA256]).unwrap_err(),
            ProtocolError::CipherSuiteNotOffered(0x1302)
        );
    }

    #[test]
    fn rejects_unknown_suite() {
        let body: Vec<u8> = sample(0x1399, 0x001D, 0x0304);
        assert_eq!(
            parse(&body, &CipherSuite::DEFAULTS).unwrap_err(),
            ProtocolError::CipherSuiteNotOffered(0x1399)
        );
    }

    #[test]
    fn rejects_non_x25519_share() {
        let body: Vec<u8> = sample(0x1301, 0x0017, 0x0304);
        assert_eq!(
            parse(&body, &CipherSuite::DEFAULTS).unwrap_err(),
            ProtocolError::UnsupportedGroup(0x0017)
        );
    }

    #[test]
    fn rejects_tls12_selection() {
        let body: Vec<u8> = sample(0x1301, 0x001D, 0x0303);
        assert_eq!(
            parse(&body, &CipherSuite::DEFAULTS).unwrap_err(),
            ProtocolError::UnsupportedVersion(0x0303)
        );
    }

    #[test]
    fn rejects_truncated_body() {
        let body: Vec<u8> = sample(0x1301, 0x001D, 0x0304);
        parse(&body[..body.len() - 1], &CipherSuite::DEFAULTS).unwrap_err();
    }
}
