use crate::alert::Alert;
use crate::state::HandshakeState;
use std::io;
use thiserror::Error;

/// TLS client errors.
///
/// Every variant except [`Error::Usage`] is fatal for the connection: the
/// handshake state machine moves to its error state and all key material is
/// discarded. [`Error::Usage`] is fatal only for the call that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure: connect, read, write, or unexpected EOF.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// The peer violated the protocol, or the handshake was driven out of
    /// order.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    /// Invalid configuration, detected before any I/O.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The API was called in the wrong lifecycle state.
    ///
    /// The connection state is unchanged.
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A handshake message arrived that does not match the state machine's
    /// expected next message.
    #[error("unexpected handshake message type {got} while waiting for {expected}")]
    UnexpectedMessage {
        expected: &'static str,
        got: u8,
    },
    /// A state transition was requested that is not in the legal transition
    /// graph.
    #[error("illegal state transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: HandshakeState,
        to: HandshakeState,
    },
    /// A message or record could not be decoded.
    #[error("malformed {message}: {reason}")]
    Decode {
        message: &'static str,
        reason: &'static str,
    },
    /// The server selected a cipher suite that was not offered.
    #[error("server selected cipher suite {0:#06x} which was not offered")]
    CipherSuiteNotOffered(u16),
    /// The server's key share is not X25519.
    #[error("server key share uses unsupported group {0:#06x}")]
    UnsupportedGroup(u16),
    /// The server selected a protocol version other than TLS 1.3.
    #[error("server selected unsupported protocol version {0:#06x}")]
    UnsupportedVersion(u16),
    /// A record exceeded the maximum permitted length.
    #[error("record of {0} bytes exceeds the maximum record length")]
    RecordOverflow(usize),
    /// The server sent an alert.
    #[error("received alert: {0}")]
    AlertReceived(Alert),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// A key schedule step was invoked before its prerequisites were
    /// derived.
    #[error("key schedule not ready: {0} is missing")]
    KeyScheduleNotReady(&'static str),
    /// X25519 produced an all-zero shared secret.
    #[error("X25519 key exchange produced a non-contributory shared secret")]
    KeyExchangeFailed,
    /// The Finished MAC did not verify under either transcript boundary.
    #[error("Finished verification failed")]
    FinishedVerifyFailed,
    /// A record failed AEAD verification.
    #[error("record failed AEAD verification")]
    BadRecordMac,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("hostname must not be empty")]
    EmptyHostname,
    #[error("no recognised cipher suite in the preference list")]
    NoCipherSuites,
    #[error("unrecognised TLS version {0:?}")]
    UnknownVersion(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// `send_data` or `receive_data` was called before the handshake
    /// completed.
    #[error("connection is not established")]
    NotConnected,
    /// `connect` was called on a client that is already connected.
    #[error("connection is already established")]
    AlreadyConnected,
    /// The connection was closed.
    #[error("connection is closed")]
    Closed,
}

/// Shorthand for [`ProtocolError::Decode`].
pub(crate) fn decode_err(message: &'static str, reason: &'static str) -> ProtocolError {
    ProtocolError::Decode { message, reason }
}
