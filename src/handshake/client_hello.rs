use super::HandshakeType;
use crate::cipher_suites::CipherSuite;
use crate::extension::ExtensionType;
use crate::record::TlsVersion;

/// # References
///
/// * [RFC 8446 Section 4.2.3](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.3)
/// * [RFC 8446 Section 9.1](https://datatracker.ietf.org/doc/html/rfc8446#section-9.1)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub(crate) enum SignatureScheme {
    RsaPkcs1Sha256 = 0x0401,
    EcdsaSecp256r1Sha256 = 0x0403,
    RsaPssRsaeSha256 = 0x0804,
}

/// # References
///
/// * [RFC 8446 Section 4.2.7](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.7)
#[repr(u16)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub(crate) enum NamedGroup {
    secp256r1 = 0x0017,
    secp384r1 = 0x0018,
    x25519 = 0x001D,
}

impl NamedGroup {
    pub const fn value(self) -> u16 {
        self as u16
    }
}

/// # References
///
/// * [RFC 8446 Section 4.2.9](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.9)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PskKeyExchangeMode {
    /// PSK with (EC)DHE key establishment.
    DheKe = 1,
}

/// Groups offered in `supported_groups`; only X25519 carries a key share.
const SUPPORTED_GROUPS: [NamedGroup; 3] = [
    NamedGroup::x25519,
    NamedGroup::secp256r1,
    NamedGroup::secp384r1,
];

const SIGNATURE_SCHEMES: [SignatureScheme; 3] = [
    SignatureScheme::RsaPssRsaeSha256,
    SignatureScheme::EcdsaSecp256r1Sha256,
    SignatureScheme::RsaPkcs1Sha256,
];

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u24(out: &mut Vec<u8>, value: usize) {
    let value: u32 = value as u32;
    out.extend_from_slice(&[(value >> 16) as u8, (value >> 8) as u8, value as u8]);
}

/// ```text
/// struct {
///     ExtensionType extension_type;
///     opaque extension_data<0..2^16-1>;
/// } Extension;
/// ```
fn extension(out: &mut Vec<u8>, extension_type: ExtensionType, data: &[u8]) {
    put_u16(out, extension_type.into());
    put_u16(out, data.len() as u16);
    out.extend_from_slice(data);
}

/// Serialise a complete ClientHello handshake frame (message header
/// included, record header excluded).
///
/// # References
///
/// * [RFC 8446 Section 4.1.2](https://datatracker.ietf.org/doc/html/rfc8446#section-4.1.2)
///
/// ```text
/// struct {
///     ProtocolVersion legacy_version = 0x0303;    /* TLS v1.2 */
///     Random random;
///     opaque legacy_session_id<0..32>;
///     CipherSuite cipher_suites<2..2^16-2>;
///     opaque legacy_compression_methods<1..2^8-1>;
///     Extension extensions<8..2^16-1>;
/// } ClientHello;
/// ```
pub(crate) fn ser(
    hostname: &str,
    random: &[u8; 32],
    session_id: &[u8; 32],
    cipher_suites: &[CipherSuite],
    alpn: &[String],
    public_key: &[u8; 32],
) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::with_capacity(256);

    put_u16(&mut body, TlsVersion::V1_2.into());
    body.extend_from_slice(random);

    // a non-empty legacy_session_id improves middlebox compatibility
    // https://www.rfc-editor.org/rfc/rfc8446#appendix-D.4
    body.push(session_id.len() as u8);
    body.extend_from_slice(session_id);

    put_u16(&mut body, (cipher_suites.len() * 2) as u16);
    for suite in cipher_suites {
        body.extend_from_slice(&suite.value());
    }

    // legacy_compression_methods: null only
    body.push(1);
    body.push(0);

    let mut extensions: Vec<u8> = Vec::with_capacity(256);

    // server name indication
    // https://datatracker.ietf.org/doc/html/rfc6066#section-3
    {
        const NAME_TYPE_HOST_NAME: u8 = 0;
        let mut server_name_list: Vec<u8> = Vec::with_capacity(3 + hostname.len());
        server_name_list.push(NAME_TYPE_HOST_NAME);
        put_u16(&mut server_name_list, hostname.len() as u16);
        server_name_list.extend_from_slice(hostname.as_bytes());

        let mut data: Vec<u8> = Vec::with_capacity(2 + server_name_list.len());
        put_u16(&mut data, server_name_list.len() as u16);
        data.extend_from_slice(&server_name_list);
        extension(&mut extensions, ExtensionType::ServerName, &data);
    }

    // supported_versions: TLS 1.3 only; also offering 1.2 would invite a
    // downgrade into cipher suites this client does not implement
    // https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.1
    {
        let mut data: Vec<u8> = Vec::with_capacity(3);
        data.push(2);
        put_u16(&mut data, TlsVersion::V1_3.into());
        extension(&mut extensions, ExtensionType::SupportedVersions, &data);
    }

    // supported_groups
    // https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.7
    {
        let mut data: Vec<u8> = Vec::with_capacity(2 + SUPPORTED_GROUPS.len() * 2);
        put_u16(&mut data, (SUPPORTED_GROUPS.len() * 2) as u16);
        for group in SUPPORTED_GROUPS {
            put_u16(&mut data, group.value());
        }
        extension(&mut extensions, ExtensionType::SupportedGroups, &data);
    }

    // signature_algorithms
    // https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.3
    {
        let mut data: Vec<u8> = Vec::with_capacity(2 + SIGNATURE_SCHEMES.len() * 2);
        put_u16(&mut data, (SIGNATURE_SCHEMES.len() * 2) as u16);
        for scheme in SIGNATURE_SCHEMES {
            put_u16(&mut data, scheme as u16);
        }
        extension(&mut extensions, ExtensionType::SignatureAlgorithms, &data);
    }

    // psk_key_exchange_modes
    // https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.9
    {
        let data: [u8; 2] = [1, PskKeyExchangeMode::DheKe as u8];
        extension(&mut extensions, ExtensionType::PskKeyExchangeModes, &data);
    }

    // application layer protocol negotiation
    // https://datatracker.ietf.org/doc/html/rfc7301#section-3.1
    if !alpn.is_empty() {
        let mut protocol_name_list: Vec<u8> = Vec::new();
        for protocol in alpn {
            protocol_name_list.push(protocol.len() as u8);
            protocol_name_list.extend_from_slice(protocol.as_bytes());
        }
        let mut data: Vec<u8> = Vec::with_capacity(2 + protocol_name_list.len());
        put_u16(&mut data, protocol_name_list.len() as u16);
        data.extend_from_slice(&protocol_name_list);
        extension(
            &mut extensions,
            ExtensionType::ApplicationLayerProtocolNegotiation,
            &data,
        );
    }

    // key_share: a single X25519 entry
    // https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.8
    {
        let mut data: Vec<u8> = Vec::with_capacity(2 + 2 + 2 + public_key.len());
        put_u16(&mut data, (2 + 2 + public_key.len()) as u16);
        put_u16(&mut data, NamedGroup::x25519.value());
        put_u16(&mut data, public_key.len() as u16);
        data.extend_from_slice(public_key);
        extension(&mut extensions, ExtensionType::KeyShare, &data);
    }

    put_u16(&mut body, extensions.len() as u16);
    body.extend_from_slice(&extensions);

    let mut frame: Vec<u8> = Vec::with_capacity(super::HandshakeHeader::LEN + body.len());
    frame.push(HandshakeType::ClientHello.into());
    put_u24(&mut frame, body.len());
    frame.extend_from_slice(&body);
    frame
}

#[cfg(test)]
mod tests {
    use super::ser;
    use crate::cipher_suites::CipherSuite;
    use crate::extension::ExtensionType;
    use crate::handshake::{HandshakeType, Reader};

    #[test]
    fn structure() {
        let random: [u8; 32] = [0xAA; 32];
        let session_id: [u8; 32] = [0xBB; 32];
        let public_key: [u8; 32] = [0xCC; 32];
        let alpn: Vec<String> = vec!["http/1.1".to_string()];

        let frame: Vec<u8> = ser(
            "example.com",
            &random,
            &session_id,
            &CipherSuite::DEFAULTS,
            &alpn,
            &public_key,
        );

        assert_eq!(frame[0], u8::from(HandshakeType::ClientHello));
        let body_len: usize =
            ((frame[1] as usize) << 16) | ((frame[2] as usize) << 8) | (frame[3] as usize);
        assert_eq!(body_len, frame.len() - 4);

        let mut reader: Reader = Reader::new(&frame[4..]);
        assert_eq!(reader.next_u16(), Some(0x0303));
        assert_eq!(reader.next_slice(32), Some(random.as_slice()));
        assert_eq!(reader.next_u8(), Some(32));
        assert_eq!(reader.next_slice(32), Some(session_id.as_slice()));

        assert_eq!(reader.next_u16(), Some(6));
        assert_eq!(reader.next_u16(), Some(0x1301));
        assert_eq!(reader.next_u16(), Some(0x1302));
        assert_eq!(reader.next_u16(), Some(0x1303));

        assert_eq!(reader.next_u8(), Some(1));
        assert_eq!(reader.next_u8(), Some(0));

        let extensions_len: usize = reader.next_u16().unwrap().into();
        assert_eq!(extensions_len, reader.remaining());

        // walk the extensions, collecting types in offer order
        let mut seen: Vec<u16> = Vec::new();
        while reader.remaining() != 0 {
            let extension_type: u16 = reader.next_u16().unwrap();
            let len: usize = reader.next_u16().unwrap().into();
            let data: &[u8] = reader.next_slice(len).unwrap();
            seen.push(extension_type);

            match ExtensionType::try_from(extension_type) {
                Ok(ExtensionType::ServerName) => {
                    assert!(data.ends_with(b"example.com"));
                }
                Ok(ExtensionType::SupportedVersions) => {
                    assert_eq!(data, &[0x02, 0x03, 0x04]);
                }
                Ok(ExtensionType::KeyShare) => {
                    assert_eq!(&data[..6], &[0x00, 0x24, 0x00, 0x1D, 0x00, 0x20]);
                    assert_eq!(&data[6..], public_key.as_slice());
                }
                Ok(ExtensionType::PskKeyExchangeModes) => {
                    assert_eq!(data, &[0x01, 0x01]);
                }
                Ok(ExtensionType::ApplicationLayerProtocolNegotiation) => {
                    assert!(data.ends_with(b"http/1.1"));
                }
                _ => (),
            }
        }

        for required in [0u16, 10, 13, 16, 43, 45, 51] {
            assert!(seen.contains(&required), "missing extension {required}");
        }
    }

    #[test]
    fn alpn_omitted_when_empty() {
        let frame: Vec<u8> = ser(
            "example.com",
            &[0; 32],
            &[0; 32],
            &[CipherSuite::TLS_AES_128_GCM_SHA256],
            &[],
            &[0; 32],
        );

        // skip to the extensions and confirm ALPN is not offered
        let mut reader: Reader = Reader::new(&frame[4..]);
        reader.skip(2 + 32 + 1 + 32).unwrap();
        let suites_len: usize = reader.next_u16().unwrap().into();
        reader.skip(suites_len + 2).unwrap();
        let _extensions_len: u16 = reader.next_u16().unwrap();

        while reader.remaining() != 0 {
            let extension_type: u16 = reader.next_u16().unwrap();
            let len: usize = reader.next_u16().unwrap().into();
            reader.skip(len).unwrap();
            assert_ne!(
                extension_type,
                u16::from(ExtensionType::ApplicationLayerProtocolNegotiation)
            );
        }
    }
}
