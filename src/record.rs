use crate::cipher_suites::CipherSuite;
use crate::crypto;
use crate::error::{Error, ProtocolError};
use log::{debug, error, trace};
use std::io::{Read, Write};
use zeroize::Zeroizing;

/// Length of a record nonce / per-record IV.
pub const IV_LEN: usize = 12;

/// Maximum length of `TLSPlaintext.fragment`.
///
/// # References
///
/// * [RFC 8446 Section 5.1](https://datatracker.ietf.org/doc/html/rfc8446#section-5.1)
pub(crate) const MAX_PLAINTEXT_LEN: usize = 16384;

/// Maximum length of `TLSCiphertext.encrypted_record`.
///
/// # References
///
/// * [RFC 8446 Section 5.2](https://datatracker.ietf.org/doc/html/rfc8446#section-5.2)
pub(crate) const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 256;

/// Protocol versions as they appear on the wire.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    V1_2 = 0x0303,
    V1_3 = 0x0304,
}

impl From<TlsVersion> for u16 {
    #[inline]
    fn from(tls_version: TlsVersion) -> Self {
        tls_version as u16
    }
}

impl TlsVersion {
    pub const fn msb(self) -> u8 {
        ((self as u16) >> 8) as u8
    }

    pub const fn lsb(self) -> u8 {
        self as u8
    }

    /// Parse a configuration name such as `"1.3"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "1.2" => Some(Self::V1_2),
            "1.3" => Some(Self::V1_3),
            _ => None,
        }
    }
}

/// Content Type.
///
/// # References
///
/// * [RFC 8446 Section 5.1](https://datatracker.ietf.org/doc/html/rfc8446#section-5.1)
///
/// ```text
/// enum {
///     invalid(0),
///     change_cipher_spec(20),
///     alert(21),
///     handshake(22),
///     application_data(23),
///     (255)
/// } ContentType;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl From<ContentType> for u8 {
    #[inline]
    fn from(content_type: ContentType) -> Self {
        content_type as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            20 => Ok(Self::ChangeCipherSpec),
            21 => Ok(Self::Alert),
            22 => Ok(Self::Handshake),
            23 => Ok(Self::ApplicationData),
            _ => Err(value),
        }
    }
}

/// # References
///
/// * [RFC 8446 Appendix B.1](https://datatracker.ietf.org/doc/html/rfc8446#appendix-B.1)
///
/// ```text
/// struct {
///     ContentType type;
///     ProtocolVersion legacy_record_version;
///     uint16 length;
///     opaque fragment[TLSPlaintext.length];
/// } TLSPlaintext;
/// ```
#[derive(Debug)]
pub(crate) struct RecordHeader {
    buf: [u8; Self::LEN],
}

impl RecordHeader {
    pub const LEN: usize = 5;

    pub fn content_type(&self) -> ContentType {
        // validated in deser, will never panic
        ContentType::try_from(self.buf[0]).unwrap()
    }

    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.buf[3], self.buf[4]])
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.buf
    }

    pub fn ser(content_type: ContentType, data_len: u16) -> Self {
        // https://www.rfc-editor.org/rfc/rfc8446#section-5.1
        // legacy_record_version MUST be set to 0x0303 for all records
        // generated by a TLS 1.3 implementation other than an initial
        // ClientHello
        RecordHeader {
            buf: [
                content_type.into(),
                TlsVersion::V1_2.msb(),
                TlsVersion::V1_2.lsb(),
                (data_len >> 8) as u8,
                data_len as u8,
            ],
        }
    }

    pub fn deser(buf: [u8; 5]) -> Result<Self, ProtocolError> {
        if let Err(value) = ContentType::try_from(buf[0]) {
            error!("invalid ContentType value: {value:#04X}");
            return Err(ProtocolError::Decode {
                message: "record header",
                reason: "invalid content type",
            });
        }

        // https://www.rfc-editor.org/rfc/rfc8446#appendix-D
        // The value of TLSPlaintext.legacy_record_version MUST be ignored
        // by all implementations.

        Ok(Self { buf })
    }
}

/// Record protection epochs, advanced monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Epoch {
    Plaintext,
    Handshake,
    Application,
}

/// Cipher state for one direction of one epoch.
pub(crate) struct CipherState {
    pub(crate) suite: CipherSuite,
    pub(crate) key: Zeroizing<Vec<u8>>,
    pub(crate) iv: Zeroizing<[u8; IV_LEN]>,
    /// Per-record sequence number, zero at installation.
    ///
    /// # References
    ///
    /// * [RFC 8446 Section 5.3](https://datatracker.ietf.org/doc/html/rfc8446#section-5.3)
    pub(crate) sequence: u64,
}

impl CipherState {
    pub fn new(suite: CipherSuite, key: Zeroizing<Vec<u8>>, iv: [u8; IV_LEN]) -> Self {
        debug_assert_eq!(key.len(), suite.key_len());
        Self {
            suite,
            key,
            iv: Zeroizing::new(iv),
            sequence: 0,
        }
    }
}

impl core::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        write!(
            f,
            "CipherState {{ suite: {:?}, sequence: {} }}",
            self.suite, self.sequence
        )
    }
}

/// Thin facade over the transport, framing records and applying the cipher
/// state of the current epoch.
///
/// The layer does not buffer: the transport is TCP, so ordering and
/// retransmission are already guaranteed.
#[derive(Debug)]
pub(crate) struct RecordLayer<S> {
    stream: S,
    epoch: Epoch,
    read_state: Option<CipherState>,
    write_state: Option<CipherState>,
}

impl<S: Read + Write> RecordLayer<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            epoch: Epoch::Plaintext,
            read_state: None,
            write_state: None,
        }
    }

    /// Send one record under the currently installed write state.
    pub fn send_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), Error> {
        debug_assert!(payload.len() <= MAX_PLAINTEXT_LEN);

        let record: Vec<u8> = match self.write_state.as_mut() {
            Some(state) => crypto::record::seal(state, content_type, payload),
            None => {
                let header: RecordHeader = RecordHeader::ser(content_type, payload.len() as u16);
                let mut record: Vec<u8> = Vec::with_capacity(RecordHeader::LEN + payload.len());
                record.extend_from_slice(header.as_bytes());
                record.extend_from_slice(payload);
                record
            }
        };

        trace!(
            "sending {content_type:?} record, {} byte payload, epoch {:?}",
            payload.len(),
            self.epoch
        );
        self.stream.write_all(&record)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Receive one record, returning the inner (decrypted) content type and
    /// payload.
    ///
    /// ChangeCipherSpec records are always unprotected and are returned
    /// as-is even after keys are installed, as are plaintext alerts sent by
    /// servers that fail before protecting their flight.
    pub fn receive_record(&mut self) -> Result<(ContentType, Vec<u8>), Error> {
        let mut header_buf: [u8; RecordHeader::LEN] = [0; RecordHeader::LEN];
        self.stream.read_exact(&mut header_buf)?;
        let header: RecordHeader = RecordHeader::deser(header_buf)?;

        let len: usize = usize::from(header.length());
        let max: usize = if self.read_state.is_some() {
            MAX_CIPHERTEXT_LEN
        } else {
            MAX_PLAINTEXT_LEN
        };
        if len > max {
            error!("record length {len} exceeds the {max} byte limit");
            return Err(ProtocolError::RecordOverflow(len).into());
        }

        let mut body: Vec<u8> = vec![0; len];
        self.stream.read_exact(&mut body)?;
        trace!(
            "received {:?} record, {len} byte body, epoch {:?}",
            header.content_type(),
            self.epoch
        );

        match (self.read_state.as_mut(), header.content_type()) {
            (Some(state), ContentType::ApplicationData) => {
                crypto::record::open(state, &header, &body)
            }
            (_, content_type) => Ok((content_type, body)),
        }
    }

    pub fn install_handshake_keys(&mut self, write: CipherState, read: CipherState) {
        self.install(Epoch::Handshake, write, read);
    }

    pub fn install_application_keys(&mut self, write: CipherState, read: CipherState) {
        self.install(Epoch::Application, write, read);
    }

    /// Swap both directions at once; the replaced states are dropped, which
    /// wipes their keys.
    fn install(&mut self, epoch: Epoch, write: CipherState, read: CipherState) {
        debug_assert!(epoch > self.epoch);
        debug!("epoch {:?} -> {epoch:?}", self.epoch);
        self.epoch = epoch;
        self.write_state.replace(write);
        self.read_state.replace(read);
    }
}

#[cfg(test)]
mod tests {
    use super::{CipherState, ContentType, RecordHeader, RecordLayer};
    use crate::cipher_suites::CipherSuite;
    use crate::error::{Error, ProtocolError};
    use std::io::{self, Read, Write};
    use zeroize::Zeroizing;

    fn state(suite: CipherSuite) -> CipherState {
        CipherState::new(
            suite,
            Zeroizing::new(vec![0x42; suite.key_len()]),
            [0x24; 12],
        )
    }

    /// Loopback transport: everything written becomes readable.
    #[derive(Default)]
    struct Loopback {
        buf: Vec<u8>,
        pos: usize,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n: usize = buf.len().min(self.buf.len() - self.pos);
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn plaintext_round_trip() {
        let mut layer: RecordLayer<Loopback> = RecordLayer::new(Loopback::default());
        layer
            .send_record(ContentType::Handshake, &[0x01, 0x02, 0x03])
            .unwrap();
        let (content_type, payload) = layer.receive_record().unwrap();
        assert_eq!(content_type, ContentType::Handshake);
        assert_eq!(payload, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn protected_round_trip() {
        for suite in CipherSuite::DEFAULTS {
            let mut layer: RecordLayer<Loopback> = RecordLayer::new(Loopback::default());
            layer.install_handshake_keys(state(suite), state(suite));

            layer
                .send_record(ContentType::Handshake, b"finished bytes")
                .unwrap();
            layer.send_record(ContentType::ApplicationData, b"ping").unwrap();

            // on the wire both are application_data with the real type inside
            let (first, payload) = layer.receive_record().unwrap();
            assert_eq!(first, ContentType::Handshake);
            assert_eq!(payload, b"finished bytes");

            let (second, payload) = layer.receive_record().unwrap();
            assert_eq!(second, ContentType::ApplicationData);
            assert_eq!(payload, b"ping");
        }
    }

    #[test]
    fn tampered_record_fails_verification() {
        let mut layer: RecordLayer<Loopback> = RecordLayer::new(Loopback::default());
        layer.install_handshake_keys(
            state(CipherSuite::TLS_AES_128_GCM_SHA256),
            state(CipherSuite::TLS_AES_128_GCM_SHA256),
        );

        layer.send_record(ContentType::ApplicationData, b"data").unwrap();
        let last: usize = layer.stream.buf.len() - 1;
        layer.stream.buf[last] ^= 0xFF;

        match layer.receive_record() {
            Err(Error::Crypto(crate::error::CryptoError::BadRecordMac)) => (),
            other => panic!("expected BadRecordMac, got {other:?}"),
        }
    }

    #[test]
    fn change_cipher_spec_is_passed_through_unprotected() {
        let mut layer: RecordLayer<Loopback> = RecordLayer::new(Loopback::default());
        layer.install_handshake_keys(
            state(CipherSuite::TLS_AES_128_GCM_SHA256),
            state(CipherSuite::TLS_AES_128_GCM_SHA256),
        );

        // a peer's middlebox-compatibility CCS arrives unencrypted
        layer
            .stream
            .buf
            .extend_from_slice(&[0x14, 0x03, 0x03, 0x00, 0x01, 0x01]);
        let (content_type, payload) = layer.receive_record().unwrap();
        assert_eq!(content_type, ContentType::ChangeCipherSpec);
        assert_eq!(payload, vec![0x01]);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let mut layer: RecordLayer<Loopback> = RecordLayer::new(Loopback::default());
        layer
            .stream
            .buf
            .extend_from_slice(&[0x16, 0x03, 0x03, 0xFF, 0xFF]);
        match layer.receive_record() {
            Err(Error::Protocol(ProtocolError::RecordOverflow(0xFFFF))) => (),
            other => panic!("expected RecordOverflow, got {other:?}"),
        }
    }

    #[test]
    fn header_rejects_invalid_content_type() {
        RecordHeader::deser([0x00, 0x03, 0x03, 0x00, 0x00]).unwrap_err();
    }
}
