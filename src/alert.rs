use core::fmt;

/// Alert level.
///
/// # References
///
/// * [RFC 8446 Section 6](https://datatracker.ietf.org/doc/html/rfc8446#section-6)
///
/// ```text
/// enum { warning(1), fatal(2), (255) } AlertLevel;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    /// Warning.
    Warning = 1,
    /// Fatal.
    ///
    /// Also used for unknown [`AlertLevel`] values; in TLS 1.3 the level is
    /// implicit in the alert description.
    Fatal = 2,
}

impl From<AlertLevel> for u8 {
    #[inline]
    fn from(alert_level: AlertLevel) -> Self {
        alert_level as u8
    }
}

impl TryFrom<u8> for AlertLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Warning),
            2 => Ok(Self::Fatal),
            _ => Err(value),
        }
    }
}

/// Alert description.
///
/// Only the closure alerts and the error alerts this client can observe or
/// emit are named; anything else is carried as [`AlertDescription::Unknown`]
/// so that it can still be reported.
///
/// # References
///
/// * [RFC 8446 Section 6](https://datatracker.ietf.org/doc/html/rfc8446#section-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    HandshakeFailure,
    IllegalParameter,
    DecodeError,
    DecryptError,
    ProtocolVersion,
    InternalError,
    UserCanceled,
    MissingExtension,
    UnsupportedExtension,
    NoApplicationProtocol,
    Unknown(u8),
}

impl AlertDescription {
    pub const fn value(self) -> u8 {
        match self {
            Self::CloseNotify => 0,
            Self::UnexpectedMessage => 10,
            Self::BadRecordMac => 20,
            Self::RecordOverflow => 22,
            Self::HandshakeFailure => 40,
            Self::IllegalParameter => 47,
            Self::DecodeError => 50,
            Self::DecryptError => 51,
            Self::ProtocolVersion => 70,
            Self::InternalError => 80,
            Self::UserCanceled => 90,
            Self::MissingExtension => 109,
            Self::UnsupportedExtension => 110,
            Self::NoApplicationProtocol => 120,
            Self::Unknown(value) => value,
        }
    }
}

impl From<u8> for AlertDescription {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::CloseNotify,
            10 => Self::UnexpectedMessage,
            20 => Self::BadRecordMac,
            22 => Self::RecordOverflow,
            40 => Self::HandshakeFailure,
            47 => Self::IllegalParameter,
            50 => Self::DecodeError,
            51 => Self::DecryptError,
            70 => Self::ProtocolVersion,
            80 => Self::InternalError,
            90 => Self::UserCanceled,
            109 => Self::MissingExtension,
            110 => Self::UnsupportedExtension,
            120 => Self::NoApplicationProtocol,
            value => Self::Unknown(value),
        }
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::CloseNotify => f.write_str("close_notify"),
            Self::UnexpectedMessage => f.write_str("unexpected_message"),
            Self::BadRecordMac => f.write_str("bad_record_mac"),
            Self::RecordOverflow => f.write_str("record_overflow"),
            Self::HandshakeFailure => f.write_str("handshake_failure"),
            Self::IllegalParameter => f.write_str("illegal_parameter"),
            Self::DecodeError => f.write_str("decode_error"),
            Self::DecryptError => f.write_str("decrypt_error"),
            Self::ProtocolVersion => f.write_str("protocol_version"),
            Self::InternalError => f.write_str("internal_error"),
            Self::UserCanceled => f.write_str("user_canceled"),
            Self::MissingExtension => f.write_str("missing_extension"),
            Self::UnsupportedExtension => f.write_str("unsupported_extension"),
            Self::NoApplicationProtocol => f.write_str("no_application_protocol"),
            Self::Unknown(value) => write!(f, "unknown({value})"),
        }
    }
}

/// A TLS alert.
///
/// # References
///
/// * [RFC 8446 Appendix B.2](https://datatracker.ietf.org/doc/html/rfc8446#appendix-B.2)
///
/// ```text
/// struct {
///     AlertLevel level;
///     AlertDescription description;
/// } Alert;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub const fn new_warning(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Warning,
            description,
        }
    }

    pub const fn new_fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        [self.level as u8, self.description.value()]
    }

    /// Decode a two-byte alert record payload.
    ///
    /// Unknown levels are treated as fatal, matching the TLS 1.3 rule that
    /// the description alone determines severity.
    pub fn from_bytes(payload: &[u8]) -> Option<Self> {
        if payload.len() != 2 {
            return None;
        }
        let level: AlertLevel = AlertLevel::try_from(payload[0]).unwrap_or(AlertLevel::Fatal);
        Some(Self {
            level,
            description: AlertDescription::from(payload[1]),
        })
    }

    pub fn is_close_notify(&self) -> bool {
        self.description == AlertDescription::CloseNotify
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.level {
            AlertLevel::Warning => write!(f, "warning {}", self.description),
            AlertLevel::Fatal => write!(f, "fatal {}", self.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Alert, AlertDescription, AlertLevel};

    #[test]
    fn round_trip() {
        let alert: Alert = Alert::new_fatal(AlertDescription::HandshakeFailure);
        assert_eq!(Alert::from_bytes(&alert.to_bytes()), Some(alert));
    }

    #[test]
    fn unknown_level_is_fatal() {
        let alert: Alert = Alert::from_bytes(&[99, 0]).unwrap();
        assert_eq!(alert.level, AlertLevel::Fatal);
        assert!(alert.is_close_notify());
    }

    #[test]
    fn truncated() {
        assert_eq!(Alert::from_bytes(&[2]), None);
    }
}
