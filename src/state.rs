use crate::error::ProtocolError;
use log::{debug, error};

/// Handshake states.
///
/// Each non-terminal state is named for the server message the client
/// expects next.
///
/// # References
///
/// * [RFC 8446 Appendix A.1](https://datatracker.ietf.org/doc/html/rfc8446#appendix-A.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// ClientHello has not been sent yet.
    Initial,
    /// Sent ClientHello, waiting for ServerHello.
    WaitServerHello,
    /// Received ServerHello, waiting for EncryptedExtensions.
    WaitEncryptedExtensions,
    /// Waiting for the server Certificate.
    WaitCertificate,
    /// Waiting for CertificateVerify.
    WaitCertificateVerify,
    /// Waiting for the server Finished.
    WaitFinished,
    /// Handshake complete, application data may flow.
    Connected,
    /// A fatal error occurred. No transition leaves this state.
    Error,
}

impl HandshakeState {
    /// The single legal successor in the happy path, if any.
    const fn successor(self) -> Option<HandshakeState> {
        match self {
            Self::Initial => Some(Self::WaitServerHello),
            Self::WaitServerHello => Some(Self::WaitEncryptedExtensions),
            Self::WaitEncryptedExtensions => Some(Self::WaitCertificate),
            Self::WaitCertificate => Some(Self::WaitCertificateVerify),
            Self::WaitCertificateVerify => Some(Self::WaitFinished),
            Self::WaitFinished => Some(Self::Connected),
            Self::Connected | Self::Error => None,
        }
    }
}

/// Handshake state machine.
///
/// The machine is purely structural: it owns no bytes and performs no I/O.
/// The connection drives it after each successful I/O step, so
/// [`current_state`](Self::current_state) always reflects the last completed
/// step, never a mid-step value.
#[derive(Debug)]
pub struct StateMachine {
    state: HandshakeState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub const fn new() -> Self {
        Self {
            state: HandshakeState::Initial,
        }
    }

    pub const fn current_state(&self) -> HandshakeState {
        self.state
    }

    /// `true` once the handshake has reached [`HandshakeState::Connected`].
    pub fn is_completed(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    pub fn is_error(&self) -> bool {
        self.state == HandshakeState::Error
    }

    /// Application data may only be sent in the terminal success state.
    pub fn can_send_application_data(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    /// Return to [`HandshakeState::Initial`], clearing any error.
    pub fn reset(&mut self) {
        debug!("{:?} -> Initial (reset)", self.state);
        self.state = HandshakeState::Initial;
    }

    /// Unconditionally enter the error state.
    pub fn fail(&mut self) {
        if self.state != HandshakeState::Error {
            debug!("{:?} -> Error", self.state);
            self.state = HandshakeState::Error;
        }
    }

    /// Attempt a transition to `target`.
    ///
    /// Any state may transition to [`HandshakeState::Error`], which is
    /// absorbing. All other targets must be the current state's single
    /// legal successor; a rejected transition moves the machine to the
    /// error state before the rejection is reported.
    pub fn try_transition(&mut self, target: HandshakeState) -> Result<(), ProtocolError> {
        let from: HandshakeState = self.state;

        if from == HandshakeState::Error {
            error!("transition to {target:?} rejected: machine is in the error state");
            return Err(ProtocolError::IllegalTransition { from, to: target });
        }

        if target == HandshakeState::Error {
            self.fail();
            return Ok(());
        }

        if from.successor() == Some(target) {
            debug!("{from:?} -> {target:?}");
            self.state = target;
            Ok(())
        } else {
            error!("illegal transition {from:?} -> {target:?}");
            self.state = HandshakeState::Error;
            Err(ProtocolError::IllegalTransition { from, to: target })
        }
    }
}
