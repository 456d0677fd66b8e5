use super::HandshakeType;

/// Build a Finished handshake frame from verify_data.
///
/// ```text
/// struct {
///     opaque verify_data[Hash.length];
/// } Finished;
/// ```
pub(crate) fn frame(verify_data: &[u8]) -> Vec<u8> {
    let mut frame: Vec<u8> = Vec::with_capacity(4 + verify_data.len());
    frame.push(HandshakeType::Finished.into());
    let len: [u8; 4] = (verify_data.len() as u32).to_be_bytes();
    frame.extend_from_slice(&len[1..]);
    frame.extend_from_slice(verify_data);
    frame
}
