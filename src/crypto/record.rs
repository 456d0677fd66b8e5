//! Record protection.
//!
//! # References
//!
//! * [RFC 8446 Section 5.2](https://datatracker.ietf.org/doc/html/rfc8446#section-5.2)
//! * [RFC 8446 Section 5.3](https://datatracker.ietf.org/doc/html/rfc8446#section-5.3)

use crate::cipher_suites::CipherSuite;
use crate::error::{decode_err, CryptoError, Error};
use crate::record::{CipherState, ContentType, RecordHeader, IV_LEN};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroizing;

/// AEAD authentication tag length; 16 for every TLS 1.3 suite.
pub(crate) const TAG_LEN: usize = 16;

/// Per-record nonce.
///
/// ```text
/// The 64-bit record sequence number is [...] XORed with the static
/// write_iv on its rightmost bytes.
/// ```
fn nonce(iv: &[u8; IV_LEN], sequence: u64) -> [u8; IV_LEN] {
    let mut nonce: [u8; IV_LEN] = *iv;
    sequence
        .to_be_bytes()
        .iter()
        .enumerate()
        .for_each(|(idx, byte)| nonce[idx + 4] ^= byte);
    nonce
}

fn encrypt(state: &CipherState, nonce_bytes: &[u8; IV_LEN], payload: Payload) -> Vec<u8> {
    // the key length is fixed by the suite and the plaintext is bounded by
    // the record size limit; neither construction nor encryption can fail
    match state.suite {
        CipherSuite::TLS_AES_128_GCM_SHA256 => Aes128Gcm::new_from_slice(&state.key)
            .unwrap()
            .encrypt(nonce_bytes.into(), payload)
            .unwrap(),
        CipherSuite::TLS_AES_256_GCM_SHA384 => Aes256Gcm::new_from_slice(&state.key)
            .unwrap()
            .encrypt(nonce_bytes.into(), payload)
            .unwrap(),
        CipherSuite::TLS_CHACHA20_POLY1305_SHA256 => ChaCha20Poly1305::new_from_slice(&state.key)
            .unwrap()
            .encrypt(nonce_bytes.into(), payload)
            .unwrap(),
    }
}

fn decrypt(
    state: &CipherState,
    nonce_bytes: &[u8; IV_LEN],
    payload: Payload,
) -> Result<Vec<u8>, CryptoError> {
    let result = match state.suite {
        CipherSuite::TLS_AES_128_GCM_SHA256 => Aes128Gcm::new_from_slice(&state.key)
            .unwrap()
            .decrypt(nonce_bytes.into(), payload),
        CipherSuite::TLS_AES_256_GCM_SHA384 => Aes256Gcm::new_from_slice(&state.key)
            .unwrap()
            .decrypt(nonce_bytes.into(), payload),
        CipherSuite::TLS_CHACHA20_POLY1305_SHA256 => ChaCha20Poly1305::new_from_slice(&state.key)
            .unwrap()
            .decrypt(nonce_bytes.into(), payload),
    };
    result.map_err(|_| CryptoError::BadRecordMac)
}

/// Protect one record, advancing the write sequence number.
///
/// Returns the complete record: header plus `TLSInnerPlaintext` ciphertext.
///
/// ```text
/// struct {
///     opaque content[TLSPlaintext.length];
///     ContentType type;
///     uint8 zeros[length_of_padding];
/// } TLSInnerPlaintext;
/// ```
pub(crate) fn seal(state: &mut CipherState, content_type: ContentType, data: &[u8]) -> Vec<u8> {
    let mut inner: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::with_capacity(data.len() + 1));
    inner.extend_from_slice(data);
    inner.push(content_type.into());

    let ciphertext_len: u16 = (inner.len() + TAG_LEN) as u16;
    let header: RecordHeader = RecordHeader::ser(ContentType::ApplicationData, ciphertext_len);
    let nonce_bytes: [u8; IV_LEN] = nonce(&state.iv, state.sequence);
    // a 64-bit sequence number cannot realistically wrap
    state.sequence = state.sequence.checked_add(1).unwrap();

    let ciphertext: Vec<u8> = encrypt(
        state,
        &nonce_bytes,
        Payload {
            msg: &inner,
            aad: header.as_bytes(),
        },
    );

    let mut record: Vec<u8> = Vec::with_capacity(RecordHeader::LEN + ciphertext.len());
    record.extend_from_slice(header.as_bytes());
    record.extend_from_slice(&ciphertext);
    record
}

/// Deprotect one record, advancing the read sequence number.
///
/// The sequence number advances even when verification fails: the peer
/// encrypted the record under that number, so later records would otherwise
/// be undecryptable.
///
/// Returns the inner content type and the payload with padding removed.
pub(crate) fn open(
    state: &mut CipherState,
    header: &RecordHeader,
    ciphertext: &[u8],
) -> Result<(ContentType, Vec<u8>), Error> {
    let nonce_bytes: [u8; IV_LEN] = nonce(&state.iv, state.sequence);
    state.sequence = state.sequence.checked_add(1).unwrap();

    let mut plaintext: Vec<u8> = decrypt(
        state,
        &nonce_bytes,
        Payload {
            msg: ciphertext,
            aad: header.as_bytes(),
        },
    )?;

    // strip zero padding back to the trailing content type byte
    while plaintext.last() == Some(&0) {
        plaintext.pop();
    }
    let content_type: u8 = plaintext
        .pop()
        .ok_or_else(|| decode_err("record", "missing inner content type"))?;
    let content_type: ContentType = ContentType::try_from(content_type)
        .map_err(|_| decode_err("record", "invalid inner content type"))?;

    Ok((content_type, plaintext))
}

#[cfg(test)]
mod tests {
    use super::{nonce, open, seal};
    use crate::cipher_suites::CipherSuite;
    use crate::record::{CipherState, ContentType, RecordHeader};
    use zeroize::Zeroizing;

    fn state() -> CipherState {
        CipherState::new(
            CipherSuite::TLS_AES_128_GCM_SHA256,
            Zeroizing::new(vec![0x11; 16]),
            [0x22; 12],
        )
    }

    #[test]
    fn nonce_xors_sequence_into_rightmost_bytes() {
        let iv: [u8; 12] = [0; 12];
        assert_eq!(nonce(&iv, 0), [0; 12]);
        assert_eq!(nonce(&iv, 1), [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(
            nonce(&iv, 0x0102_0304_0506_0708),
            [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]
        );

        let iv: [u8; 12] = [0xFF; 12];
        assert_eq!(
            nonce(&iv, 1),
            [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]
        );
    }

    #[test]
    fn seal_then_open() {
        let mut write: CipherState = state();
        let mut read: CipherState = state();

        let record: Vec<u8> = seal(&mut write, ContentType::Handshake, b"hello");
        assert_eq!(write.sequence, 1);
        assert_eq!(record[0], u8::from(ContentType::ApplicationData));

        let header: RecordHeader =
            RecordHeader::deser(record[..RecordHeader::LEN].try_into().unwrap()).unwrap();
        let (content_type, payload) =
            open(&mut read, &header, &record[RecordHeader::LEN..]).unwrap();
        assert_eq!(content_type, ContentType::Handshake);
        assert_eq!(payload, b"hello");
        assert_eq!(read.sequence, 1);
    }

    #[test]
    fn sequence_advances_on_failed_open() {
        let mut write: CipherState = state();
        let mut read: CipherState = state();

        let mut record: Vec<u8> = seal(&mut write, ContentType::ApplicationData, b"a");
        let last: usize = record.len() - 1;
        record[last] ^= 1;

        let header: RecordHeader =
            RecordHeader::deser(record[..RecordHeader::LEN].try_into().unwrap()).unwrap();
        open(&mut read, &header, &record[RecordHeader::LEN..]).unwrap_err();
        assert_eq!(read.sequence, 1);

        // the next record still decrypts
        let record: Vec<u8> = seal(&mut write, ContentType::ApplicationData, b"b");
        let header: RecordHeader =
            RecordHeader::deser(record[..RecordHeader::LEN].try_into().unwrap()).unwrap();
        let (_, payload) = open(&mut read, &header, &record[RecordHeader::LEN..]).unwrap();
        assert_eq!(payload, b"b");
    }
}
