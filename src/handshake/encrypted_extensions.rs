use super::Reader;
use crate::extension::ExtensionType;
use log::debug;

/// Walk an EncryptedExtensions body and extract the negotiated ALPN
/// protocol, if any.
///
/// The walk is tolerant: the frame has already been committed to the
/// transcript byte-for-byte, so a decode problem here only means the ALPN
/// result is unknown, never a handshake failure.
///
/// # References
///
/// * [RFC 8446 Section 4.3.1](https://datatracker.ietf.org/doc/html/rfc8446#section-4.3.1)
/// * [RFC 7301 Section 3.1](https://datatracker.ietf.org/doc/html/rfc7301#section-3.1)
///
/// ```text
/// struct {
///     Extension extensions<0..2^16-1>;
/// } EncryptedExtensions;
/// ```
pub(crate) fn negotiated_alpn(body: &[u8]) -> Option<Vec<u8>> {
    let mut reader: Reader = Reader::new(body);
    let extensions_len: usize = reader.next_u16()?.into();
    if extensions_len != reader.remaining() {
        debug!("EncryptedExtensions length mismatch, skipping extension walk");
        return None;
    }

    while reader.remaining() != 0 {
        let extension_type: u16 = reader.next_u16()?;
        let extension_len: usize = reader.next_u16()?.into();
        let data: &[u8] = reader.next_slice(extension_len)?;

        if extension_type != u16::from(ExtensionType::ApplicationLayerProtocolNegotiation) {
            debug!("ignoring EncryptedExtensions extension {extension_type}");
            continue;
        }

        // ProtocolNameList with exactly one selected protocol
        let mut alpn: Reader = Reader::new(data);
        let list_len: usize = alpn.next_u16()?.into();
        if list_len != alpn.remaining() {
            return None;
        }
        let name_len: usize = alpn.next_u8()?.into();
        return alpn.next_slice(name_len).map(<[u8]>::to_vec);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::negotiated_alpn;

    #[test]
    fn extracts_alpn() {
        // extensions: ALPN carrying "http/1.1"
        let body: &[u8] = &[
            0x00, 0x0F, // extensions length
            0x00, 0x10, // ALPN
            0x00, 0x0B, // extension length
            0x00, 0x09, // protocol name list length
            0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1',
        ];
        assert_eq!(negotiated_alpn(body), Some(b"http/1.1".to_vec()));
    }

    #[test]
    fn empty_extensions() {
        assert_eq!(negotiated_alpn(&[0x00, 0x00]), None);
    }

    #[test]
    fn malformed_body_is_tolerated() {
        assert_eq!(negotiated_alpn(&[0x00]), None);
        assert_eq!(negotiated_alpn(&[0x00, 0x10, 0x00]), None);
    }
}
