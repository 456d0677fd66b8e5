//! TLS 1.3 client over blocking TCP.
//!
//! This crate drives a client from an unencrypted TCP stream through a
//! complete TLS 1.3 handshake into authenticated application-data exchange:
//! ClientHello construction, handshake-message reassembly, the HKDF key
//! schedule, Finished verification, and the cipher-state handoff between
//! record epochs.
//!
//! # Warning
//!
//! ⚠️ The server is **not authenticated** ⚠️
//!
//! Certificate and CertificateVerify messages are carried in the transcript
//! exactly as received but their contents are never validated. Connections
//! are private against passive observers only; an active attacker can
//! impersonate any server. Callers that need authentication must layer an
//! X.509 verifier on top.
//!
//! # Limitations
//!
//! * Key exchange: X25519 only
//! * Cipher suites: `TLS_AES_128_GCM_SHA256`, `TLS_AES_256_GCM_SHA384`,
//!   `TLS_CHACHA20_POLY1305_SHA256`
//! * Does not support session resumption or pre-shared keys
//! * Does not support early data
//! * Does not support client certificates (mutual TLS)
//! * Does not support TLS 1.2 or earlier
//! * Does not support serving TLS
//!
//! # Example
//!
//! ```no_run
//! use tls13_client::{Client, ClientOptions};
//!
//! let mut client: Client = Client::new("example.com", 443, ClientOptions::default())?;
//! client.connect()?;
//! client.send_data(b"GET / HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n")?;
//! let response: Vec<u8> = client.receive_data()?;
//! client.close();
//! # Ok::<(), tls13_client::Error>(())
//! ```
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg))]
#![deny(unsafe_code)]

mod alert;
mod cipher_suites;
mod crypto;
mod error;
mod extension;
mod handshake;
mod io;
mod key_schedule;
mod options;
mod record;
mod state;
mod transcript;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use cipher_suites::CipherSuite;
pub use error::{ConfigError, CryptoError, Error, ProtocolError, UsageError};
pub use key_schedule::HashAlgorithm;
pub use options::ClientOptions;
pub use record::TlsVersion;
pub use state::{HandshakeState, StateMachine};

use crate::handshake::{client_hello, encrypted_extensions, finished, HandshakeType};
use crate::io::MessageReassembler;
use crate::key_schedule::KeySchedule;
use crate::record::{CipherState, ContentType, RecordLayer, MAX_PLAINTEXT_LEN};
use crate::transcript::Transcript;
use log::{debug, error, info, trace, warn};
use rand_core::{OsRng, RngCore};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// Connection lifecycle states, as reported by [`Client::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, not yet connected.
    Initial,
    /// Transport establishment or handshake in progress.
    Connecting,
    /// Handshake complete, application data may flow.
    Established,
    /// Closed by [`Client::close`] or by the peer's close_notify.
    Closed,
    /// A fatal error occurred; key material has been discarded.
    Error,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Connecting => "connecting",
            Self::Established => "established",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TLS 1.3 client.
///
/// Generic over the transport so that tests can substitute an in-memory
/// stream; [`Client::connect`] provides the TCP instantiation.
pub struct Client<S = TcpStream> {
    hostname: String,
    port: u16,
    options: ClientOptions,
    /// Parsed from the configured version name; informational only.
    version: TlsVersion,
    /// Normalised cipher suite preference list.
    suites: Vec<CipherSuite>,
    machine: StateMachine,
    key_schedule: KeySchedule,
    transcript: Transcript,
    reassembler: MessageReassembler,
    records: Option<RecordLayer<S>>,
    alpn_protocol: Option<Vec<u8>>,
    conn: ConnectionState,
}

impl Client<TcpStream> {
    /// Resolve the configured hostname and drive the handshake over a new
    /// TCP connection.
    ///
    /// The configured timeout applies to transport establishment only;
    /// handshake and application I/O block without a deadline unless the
    /// caller sets one on the stream.
    pub fn connect(&mut self) -> Result<(), Error> {
        self.ensure_unconnected()?;

        let addr: std::net::SocketAddr = (self.hostname.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "hostname did not resolve to any address",
                )
            })?;

        debug!(
            "connecting to {addr} with timeout {:?}",
            self.options.timeout
        );
        let stream: TcpStream = TcpStream::connect_timeout(&addr, self.options.timeout)?;
        self.connect_over(stream)
    }
}

impl<S: Read + Write> Client<S> {
    /// Create a new client.
    ///
    /// Configuration is validated here, before any I/O: the hostname must
    /// be non-empty (it is sent as the SNI host_name), the version name
    /// must be recognised, and the cipher suite preference list must
    /// contain at least one recognised name.
    pub fn new(hostname: &str, port: u16, options: ClientOptions) -> Result<Self, Error> {
        if hostname.is_empty() {
            return Err(ConfigError::EmptyHostname.into());
        }
        let version: TlsVersion = options.parsed_version()?;
        let suites: Vec<CipherSuite> = options.normalized_cipher_suites()?;

        Ok(Self {
            hostname: hostname.to_string(),
            port,
            options,
            version,
            suites,
            machine: StateMachine::new(),
            key_schedule: KeySchedule::new(),
            transcript: Transcript::new(),
            reassembler: MessageReassembler::new(),
            records: None,
            alpn_protocol: None,
            conn: ConnectionState::Initial,
        })
    }

    /// Drive the handshake over an already-established transport.
    ///
    /// On error the state machine is left in its error state, the transport
    /// is dropped, and all key material is wiped.
    pub fn connect_over(&mut self, stream: S) -> Result<(), Error> {
        self.ensure_unconnected()?;

        self.conn = ConnectionState::Connecting;
        self.records.replace(RecordLayer::new(stream));

        match self.run_handshake() {
            Ok(()) => {
                self.conn = ConnectionState::Established;
                info!(
                    "handshake complete: {:?}, ALPN {:?}",
                    self.key_schedule.suite(),
                    self.alpn_protocol
                        .as_deref()
                        .map(String::from_utf8_lossy)
                );
                Ok(())
            }
            Err(err) => {
                error!("handshake failed: {err}");
                self.send_fatal_alert(&err);
                self.abort();
                Err(err)
            }
        }
    }

    /// Send application data.
    ///
    /// Requires an established connection. Data longer than one record
    /// allows is split across multiple application_data records.
    pub fn send_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.require_established()?;
        let records: &mut RecordLayer<S> =
            self.records.as_mut().ok_or(UsageError::NotConnected)?;

        if data.is_empty() {
            return records.send_record(ContentType::ApplicationData, data);
        }
        for chunk in data.chunks(MAX_PLAINTEXT_LEN) {
            records.send_record(ContentType::ApplicationData, chunk)?;
        }
        Ok(())
    }

    /// Receive the next application data payload.
    ///
    /// Post-handshake messages (NewSessionTicket, key_update requests),
    /// stray ChangeCipherSpec records, and records that fail AEAD
    /// verification are skipped with a log line. A close_notify from the
    /// peer closes the connection and is surfaced as
    /// [`ProtocolError::AlertReceived`].
    pub fn receive_data(&mut self) -> Result<Vec<u8>, Error> {
        self.require_established()?;

        loop {
            let records: &mut RecordLayer<S> =
                self.records.as_mut().ok_or(UsageError::NotConnected)?;
            match records.receive_record() {
                Ok((ContentType::ApplicationData, payload)) => {
                    if payload.is_empty() {
                        trace!("skipping empty application_data record");
                        continue;
                    }
                    return Ok(payload);
                }
                Ok((ContentType::Handshake, payload)) => {
                    // NewSessionTicket offers and key_update requests;
                    // neither resumption nor key updates are supported
                    debug!(
                        "skipping {} bytes of post-handshake messages",
                        payload.len()
                    );
                }
                Ok((ContentType::ChangeCipherSpec, _)) => {
                    trace!("skipping change_cipher_spec record");
                }
                Ok((ContentType::Alert, payload)) => {
                    let err: Error = self.alert_error(&payload);
                    if let Error::Protocol(ProtocolError::AlertReceived(alert)) = &err {
                        if alert.is_close_notify() {
                            info!("peer closed the connection");
                            self.close();
                            return Err(err);
                        }
                    }
                    self.abort();
                    return Err(err);
                }
                Err(Error::Crypto(CryptoError::BadRecordMac)) => {
                    warn!("skipping record that failed AEAD verification");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the connection.
    ///
    /// A best-effort close_notify is sent if the handshake had completed.
    /// All key material is wiped. Calling `close` again is a no-op.
    pub fn close(&mut self) {
        if self.conn == ConnectionState::Closed {
            return;
        }

        if let Some(records) = self.records.as_mut() {
            if self.machine.can_send_application_data() {
                let alert: Alert = Alert::new_warning(AlertDescription::CloseNotify);
                if let Err(err) = records.send_record(ContentType::Alert, &alert.to_bytes()) {
                    debug!("failed to send close_notify: {err}");
                }
            }
        }

        // dropping the record layer closes the transport and wipes the
        // traffic keys
        self.records = None;
        self.key_schedule.reset();
        self.transcript.clear();
        self.conn = ConnectionState::Closed;
        debug!("connection closed");
    }

    /// `true` once the handshake has completed and the connection is open.
    pub fn is_established(&self) -> bool {
        self.conn == ConnectionState::Established && self.machine.can_send_application_data()
    }

    /// Current connection lifecycle state.
    pub const fn state(&self) -> ConnectionState {
        self.conn
    }

    /// Configured protocol version as an informational number: 12 for
    /// `"1.2"`, 13 for `"1.3"`. The handshake itself is always TLS 1.3.
    pub const fn version(&self) -> u8 {
        match self.version {
            TlsVersion::V1_2 => 12,
            TlsVersion::V1_3 => 13,
        }
    }

    /// ALPN protocol selected by the server, if any.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.alpn_protocol.as_deref()
    }

    fn ensure_unconnected(&self) -> Result<(), UsageError> {
        match self.conn {
            ConnectionState::Initial => Ok(()),
            ConnectionState::Closed => Err(UsageError::Closed),
            _ => Err(UsageError::AlreadyConnected),
        }
    }

    fn require_established(&self) -> Result<(), UsageError> {
        match self.conn {
            ConnectionState::Established if self.machine.can_send_application_data() => Ok(()),
            ConnectionState::Closed => Err(UsageError::Closed),
            _ => Err(UsageError::NotConnected),
        }
    }

    /// Notify the peer of a fatal handshake failure, best effort.
    ///
    /// # References
    ///
    /// * [RFC 8446 Section 6.2](https://datatracker.ietf.org/doc/html/rfc8446#section-6.2)
    fn send_fatal_alert(&mut self, err: &Error) {
        let description: AlertDescription = match fatal_alert_description(err) {
            Some(description) => description,
            None => return,
        };
        if let Some(records) = self.records.as_mut() {
            let alert: Alert = Alert::new_fatal(description);
            debug!("sending alert: {alert}");
            if let Err(send_err) = records.send_record(ContentType::Alert, &alert.to_bytes()) {
                debug!("failed to send {description} alert: {send_err}");
            }
        }
    }

    /// Tear down after a fatal error: error state, transport dropped, key
    /// material wiped.
    fn abort(&mut self) {
        self.machine.fail();
        self.key_schedule.reset();
        self.transcript.clear();
        self.records = None;
        self.conn = ConnectionState::Error;
    }

    fn run_handshake(&mut self) -> Result<(), Error> {
        self.send_client_hello()?;
        self.process_server_hello()?;
        self.process_encrypted_extensions()?;
        self.process_opaque_flight(
            HandshakeType::Certificate,
            HandshakeState::WaitCertificateVerify,
        )?;
        self.process_opaque_flight(
            HandshakeType::CertificateVerify,
            HandshakeState::WaitFinished,
        )?;
        self.process_server_finished()?;

        if !self.reassembler.is_empty() {
            warn!("leftover handshake bytes after the server Finished");
        }
        debug_assert!(self.machine.is_completed());
        Ok(())
    }

    fn send_client_hello(&mut self) -> Result<(), Error> {
        let mut rng: OsRng = OsRng;
        let public_key: [u8; 32] = self.key_schedule.generate_keypair(&mut rng);

        let mut random: [u8; 32] = [0; 32];
        rng.fill_bytes(&mut random);
        let mut session_id: [u8; 32] = [0; 32];
        rng.fill_bytes(&mut session_id);

        let frame: Vec<u8> = client_hello::ser(
            &self.hostname,
            &random,
            &session_id,
            &self.suites,
            &self.options.alpn,
            &public_key,
        );

        let records: &mut RecordLayer<S> =
            self.records.as_mut().ok_or(UsageError::NotConnected)?;
        records.send_record(ContentType::Handshake, &frame)?;
        self.transcript.push(&frame);
        self.machine.try_transition(HandshakeState::WaitServerHello)?;

        // middlebox-compatibility ChangeCipherSpec, sent once in plaintext
        // https://www.rfc-editor.org/rfc/rfc8446#appendix-D.4
        records.send_record(ContentType::ChangeCipherSpec, &[0x01])?;
        Ok(())
    }

    fn process_server_hello(&mut self) -> Result<(), Error> {
        let frame: Vec<u8> = self.expect_message(HandshakeType::ServerHello)?;
        let hello: handshake::server_hello::ServerHello =
            handshake::server_hello::parse(&frame[4..], &self.suites)?;
        debug!("server selected {:?}", hello.cipher_suite);
        self.transcript.push(&frame);

        self.key_schedule.set_suite(hello.cipher_suite);
        self.key_schedule.set_server_public_key(hello.server_public);
        self.key_schedule.compute_shared_secret()?;
        self.key_schedule.derive_early()?;
        self.key_schedule.derive_handshake()?;
        self.key_schedule
            .derive_handshake_traffic(self.transcript.bytes())?;

        let (write, read): (CipherState, CipherState) =
            self.key_schedule.handshake_cipher_states()?;
        let records: &mut RecordLayer<S> =
            self.records.as_mut().ok_or(UsageError::NotConnected)?;
        records.install_handshake_keys(write, read);

        self.machine
            .try_transition(HandshakeState::WaitEncryptedExtensions)?;
        Ok(())
    }

    fn process_encrypted_extensions(&mut self) -> Result<(), Error> {
        let frame: Vec<u8> = self.expect_message(HandshakeType::EncryptedExtensions)?;

        match encrypted_extensions::negotiated_alpn(&frame[4..]) {
            Some(protocol) => {
                debug!(
                    "server selected ALPN protocol {:?}",
                    String::from_utf8_lossy(&protocol)
                );
                self.alpn_protocol.replace(protocol);
            }
            None => debug!("no ALPN protocol selected"),
        }

        self.transcript.push(&frame);
        self.machine
            .try_transition(HandshakeState::WaitCertificate)?;
        Ok(())
    }

    /// Consume a certificate-flight message as opaque bytes.
    ///
    /// The body is committed to the transcript exactly as received and is
    /// otherwise not interpreted; authenticating the chain is delegated to
    /// an outer verifier.
    fn process_opaque_flight(
        &mut self,
        expected: HandshakeType,
        target: HandshakeState,
    ) -> Result<(), Error> {
        let frame: Vec<u8> = self.expect_message(expected)?;
        self.transcript.push(&frame);
        self.machine.try_transition(target)?;
        Ok(())
    }

    fn process_server_finished(&mut self) -> Result<(), Error> {
        let frame: Vec<u8> = self.expect_message(HandshakeType::Finished)?;

        // verified against the transcript through CertificateVerify, i.e.
        // before this frame is appended
        self.key_schedule
            .verify_server_finished(&frame[4..], self.transcript.bytes(), &frame)?;
        debug!("server Finished verified");
        self.transcript.push(&frame);

        let verify_data: Vec<u8> = self
            .key_schedule
            .client_finished_verify_data(self.transcript.bytes())?;
        let finished_frame: Vec<u8> = finished::frame(&verify_data);

        let records: &mut RecordLayer<S> =
            self.records.as_mut().ok_or(UsageError::NotConnected)?;
        records.send_record(ContentType::Handshake, &finished_frame)?;
        self.transcript.push(&finished_frame);

        self.key_schedule
            .derive_application(self.transcript.bytes())?;
        let (write, read): (CipherState, CipherState) =
            self.key_schedule.application_cipher_states()?;
        let records: &mut RecordLayer<S> =
            self.records.as_mut().ok_or(UsageError::NotConnected)?;
        records.install_application_keys(write, read);

        self.machine.try_transition(HandshakeState::Connected)?;
        Ok(())
    }

    /// Pull the next reassembled handshake frame and check its type.
    fn expect_message(&mut self, expected: HandshakeType) -> Result<Vec<u8>, Error> {
        let frame: Vec<u8> = self.next_handshake_frame()?;
        if frame[0] != u8::from(expected) {
            error!(
                "expected {} but received handshake message type {}",
                expected.name(),
                frame[0]
            );
            return Err(ProtocolError::UnexpectedMessage {
                expected: expected.name(),
                got: frame[0],
            }
            .into());
        }
        Ok(frame)
    }

    /// Pull records until the reassembler yields one complete handshake
    /// frame. Alerts terminate the handshake; everything else is routed
    /// through the reassembler, which discards non-handshake content.
    fn next_handshake_frame(&mut self) -> Result<Vec<u8>, Error> {
        loop {
            if let Some(frame) = self.reassembler.next_message() {
                return Ok(frame);
            }

            let records: &mut RecordLayer<S> =
                self.records.as_mut().ok_or(UsageError::NotConnected)?;
            let (content_type, payload): (ContentType, Vec<u8>) = records.receive_record()?;
            match content_type {
                ContentType::Alert => return Err(self.alert_error(&payload)),
                other => self.reassembler.push_record(other, &payload),
            }
        }
    }

    fn alert_error(&self, payload: &[u8]) -> Error {
        match Alert::from_bytes(payload) {
            Some(alert) => {
                error!("received alert: {alert}");
                ProtocolError::AlertReceived(alert).into()
            }
            None => error::decode_err("alert", "bad length").into(),
        }
    }
}

/// Alert to send the peer for a locally-detected handshake failure.
///
/// `None` when no alert is owed: transport failures cannot be written to,
/// and a peer that alerted us first does not get a reply alert.
fn fatal_alert_description(err: &Error) -> Option<AlertDescription> {
    match err {
        Error::Protocol(protocol_err) => match protocol_err {
            ProtocolError::UnexpectedMessage { .. } | ProtocolError::IllegalTransition { .. } => {
                Some(AlertDescription::UnexpectedMessage)
            }
            ProtocolError::Decode { .. } => Some(AlertDescription::DecodeError),
            ProtocolError::CipherSuiteNotOffered(_) | ProtocolError::UnsupportedGroup(_) => {
                Some(AlertDescription::IllegalParameter)
            }
            ProtocolError::UnsupportedVersion(_) => Some(AlertDescription::ProtocolVersion),
            ProtocolError::RecordOverflow(_) => Some(AlertDescription::RecordOverflow),
            ProtocolError::AlertReceived(_) => None,
        },
        Error::Crypto(crypto_err) => match crypto_err {
            CryptoError::FinishedVerifyFailed => Some(AlertDescription::DecryptError),
            CryptoError::BadRecordMac => Some(AlertDescription::BadRecordMac),
            CryptoError::KeyExchangeFailed => Some(AlertDescription::IllegalParameter),
            CryptoError::KeyScheduleNotReady(_) => Some(AlertDescription::InternalError),
        },
        Error::Transport(_) | Error::Config(_) | Error::Usage(_) => None,
    }
}

impl<S> core::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        f.debug_struct("Client")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("state", &self.conn)
            .finish_non_exhaustive()
    }
}
