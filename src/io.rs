use crate::handshake::HandshakeHeader;
use crate::record::ContentType;
use log::{trace, warn};

/// Handshake message reassembler.
///
/// Handshake messages may be fragmented across records and several messages
/// may be coalesced into one record, so record payloads are accumulated here
/// and complete messages are popped one at a time.
///
/// The output is a function of the concatenated payload bytes alone: feeding
/// the same byte stream fragmented differently yields the same sequence of
/// frames.
///
/// # References
///
/// * [RFC 8446 Section 5.1](https://datatracker.ietf.org/doc/html/rfc8446#section-5.1)
#[derive(Debug, Default)]
pub(crate) struct MessageReassembler {
    buf: Vec<u8>,
}

impl MessageReassembler {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed the plaintext payload of one record.
    ///
    /// Only handshake payloads are buffered. ChangeCipherSpec records are
    /// the TLS 1.3 middlebox-compatibility artifact and are dropped without
    /// touching the buffer; any other content type reaching this point is
    /// dropped too, with a warning.
    pub fn push_record(&mut self, content_type: ContentType, payload: &[u8]) {
        match content_type {
            ContentType::Handshake => self.buf.extend_from_slice(payload),
            ContentType::ChangeCipherSpec => {
                // https://datatracker.ietf.org/doc/html/rfc8446#section-5
                // An implementation may receive an unencrypted record of
                // type change_cipher_spec consisting of the single byte
                // value 0x01 at any time after the first ClientHello
                // message has been sent or received [...] and MUST simply
                // drop it without further processing.
                trace!("dropping change_cipher_spec record");
                if payload != [0x01] {
                    warn!("change_cipher_spec payload {payload:02X?} is not the expected 0x01");
                }
            }
            other => warn!("dropping {other:?} record fed to the handshake reassembler"),
        }
    }

    /// Pop one complete handshake frame: type, 24-bit big-endian length,
    /// body.
    ///
    /// Returns `None` while the buffer holds only a partial frame. Never
    /// returns a partial frame and never merges two frames; after a pop the
    /// remaining bytes are a prefix of the next frame.
    pub fn next_message(&mut self) -> Option<Vec<u8>> {
        if self.buf.len() < HandshakeHeader::LEN {
            return None;
        }

        // header peek only, nothing is consumed until the body is complete
        let header: HandshakeHeader = HandshakeHeader::from([
            self.buf[0],
            self.buf[1],
            self.buf[2],
            self.buf[3],
        ]);
        let frame_len: usize = header.length_with_header() as usize;

        if self.buf.len() < frame_len {
            trace!(
                "handshake message is fragmented: have {} of {} bytes",
                self.buf.len(),
                frame_len
            );
            return None;
        }

        let frame: Vec<u8> = self.buf.drain(..frame_len).collect();
        trace!(
            "reassembled handshake message type {:?} length {}",
            header.msg_type(),
            header.length()
        );
        Some(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::MessageReassembler;
    use crate::record::ContentType;

    const FRAME: [u8; 10] = [0x02, 0x00, 0x00, 0x06, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

    #[test]
    fn reassembles_across_records() {
        let mut reassembler: MessageReassembler = MessageReassembler::new();

        reassembler.push_record(ContentType::Handshake, &FRAME[..3]);
        assert_eq!(reassembler.next_message(), None);
        reassembler.push_record(ContentType::Handshake, &FRAME[3..6]);
        assert_eq!(reassembler.next_message(), None);
        reassembler.push_record(ContentType::Handshake, &FRAME[6..]);

        assert_eq!(reassembler.next_message(), Some(FRAME.to_vec()));
        assert!(reassembler.is_empty());
        assert_eq!(reassembler.next_message(), None);
    }

    #[test]
    fn ignores_change_cipher_spec() {
        let mut reassembler: MessageReassembler = MessageReassembler::new();

        reassembler.push_record(ContentType::ChangeCipherSpec, &[0x01]);
        assert_eq!(reassembler.next_message(), None);

        reassembler.push_record(ContentType::Handshake, &FRAME);
        assert_eq!(reassembler.next_message(), Some(FRAME.to_vec()));
        assert!(reassembler.is_empty());
    }

    #[test]
    fn never_merges_frames() {
        let mut reassembler: MessageReassembler = MessageReassembler::new();

        let mut coalesced: Vec<u8> = FRAME.to_vec();
        coalesced.extend_from_slice(&[0x08, 0x00, 0x00, 0x02, 0x00, 0x00]);
        reassembler.push_record(ContentType::Handshake, &coalesced);

        assert_eq!(reassembler.next_message(), Some(FRAME.to_vec()));
        assert_eq!(
            reassembler.next_message(),
            Some(vec![0x08, 0x00, 0x00, 0x02, 0x00, 0x00])
        );
        assert!(reassembler.is_empty());
    }

    #[test]
    fn fragmentation_invariant() {
        // the same byte stream split at every possible point yields the
        // same frames
        let mut stream: Vec<u8> = FRAME.to_vec();
        stream.extend_from_slice(&[0x0B, 0x00, 0x00, 0x01, 0x42]);

        for split in 0..=stream.len() {
            let mut reassembler: MessageReassembler = MessageReassembler::new();
            reassembler.push_record(ContentType::Handshake, &stream[..split]);
            reassembler.push_record(ContentType::Handshake, &stream[split..]);

            assert_eq!(reassembler.next_message(), Some(FRAME.to_vec()));
            assert_eq!(
                reassembler.next_message(),
                Some(vec![0x0B, 0x00, 0x00, 0x01, 0x42])
            );
            assert_eq!(reassembler.next_message(), None);
        }
    }

    #[test]
    fn leftover_is_prefix_of_next_frame() {
        let mut reassembler: MessageReassembler = MessageReassembler::new();

        let mut stream: Vec<u8> = FRAME.to_vec();
        stream.extend_from_slice(&[0x0B, 0x00]);
        reassembler.push_record(ContentType::Handshake, &stream);

        assert_eq!(reassembler.next_message(), Some(FRAME.to_vec()));
        assert_eq!(reassembler.next_message(), None);
        assert!(!reassembler.is_empty());
    }
}
