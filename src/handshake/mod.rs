pub(crate) mod client_hello;
pub(crate) mod encrypted_extensions;
pub(crate) mod finished;
pub(crate) mod server_hello;

/// Handshake Type.
///
/// # References
///
/// * [RFC 8446 Section 4](https://datatracker.ietf.org/doc/html/rfc8446#section-4)
///
/// ```text
/// enum {
///     client_hello(1),
///     server_hello(2),
///     new_session_ticket(4),
///     end_of_early_data(5),
///     encrypted_extensions(8),
///     certificate(11),
///     certificate_request(13),
///     certificate_verify(15),
///     finished(20),
///     key_update(24),
///     message_hash(254),
///     (255)
/// } HandshakeType;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EndOfEarlyData = 5,
    EncryptedExtensions = 8,
    Certificate = 11,
    CertificateRequest = 13,
    CertificateVerify = 15,
    Finished = 20,
    KeyUpdate = 24,
}

impl HandshakeType {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::ClientHello => "ClientHello",
            Self::ServerHello => "ServerHello",
            Self::NewSessionTicket => "NewSessionTicket",
            Self::EndOfEarlyData => "EndOfEarlyData",
            Self::EncryptedExtensions => "EncryptedExtensions",
            Self::Certificate => "Certificate",
            Self::CertificateRequest => "CertificateRequest",
            Self::CertificateVerify => "CertificateVerify",
            Self::Finished => "Finished",
            Self::KeyUpdate => "KeyUpdate",
        }
    }
}

impl From<HandshakeType> for u8 {
    #[inline]
    fn from(handshake_type: HandshakeType) -> Self {
        handshake_type as u8
    }
}

impl TryFrom<u8> for HandshakeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ClientHello),
            2 => Ok(Self::ServerHello),
            4 => Ok(Self::NewSessionTicket),
            5 => Ok(Self::EndOfEarlyData),
            8 => Ok(Self::EncryptedExtensions),
            11 => Ok(Self::Certificate),
            13 => Ok(Self::CertificateRequest),
            15 => Ok(Self::CertificateVerify),
            20 => Ok(Self::Finished),
            24 => Ok(Self::KeyUpdate),
            _ => Err(value),
        }
    }
}

/// # References
///
/// * [RFC 8446 Section 4](https://datatracker.ietf.org/doc/html/rfc8446#section-4)
///
/// ```text
/// struct {
///     HandshakeType msg_type;    /* handshake type */
///     uint24 length;             /* bytes in message */
///     ...
/// } Handshake;
/// ```
pub(crate) struct HandshakeHeader {
    buf: [u8; Self::LEN],
}

impl From<[u8; Self::LEN]> for HandshakeHeader {
    fn from(buf: [u8; Self::LEN]) -> Self {
        Self { buf }
    }
}

impl HandshakeHeader {
    pub const LEN: usize = 4;

    pub fn msg_type(&self) -> Result<HandshakeType, u8> {
        self.buf[0].try_into()
    }

    pub fn length(&self) -> u32 {
        u32::from_be_bytes(self.buf) & 0x00FF_FFFF
    }

    pub fn length_with_header(&self) -> u32 {
        self.length() + (Self::LEN as u32)
    }
}

/// Sequential reader over a message body.
///
/// All accessors return `None` past the end of the input; callers translate
/// that into their message-specific decode error.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next_slice(&mut self, len: usize) -> Option<&'a [u8]> {
        let end: usize = self.pos.checked_add(len)?;
        if end > self.buf.len() {
            return None;
        }
        let slice: &'a [u8] = &self.buf[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    pub fn next_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        // length always matches, try_into cannot fail
        self.next_slice(N).map(|slice| slice.try_into().unwrap())
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        self.next_array::<1>().map(|bytes| bytes[0])
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        self.next_array().map(u16::from_be_bytes)
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.next_slice(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::{HandshakeHeader, Reader};

    #[test]
    fn header_length() {
        let header: HandshakeHeader = HandshakeHeader::from([0x02, 0x00, 0x00, 0x06]);
        assert_eq!(header.length(), 6);
        assert_eq!(header.length_with_header(), 10);
    }

    #[test]
    fn reader_bounds() {
        let mut reader: Reader = Reader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(reader.next_u16(), Some(0x0102));
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.next_u16(), None);
        assert_eq!(reader.next_u8(), Some(0x03));
        assert_eq!(reader.next_u8(), None);
        assert_eq!(reader.skip(1), None);
    }
}
