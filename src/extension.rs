/// Extensions.
///
/// Only the extensions this client offers or expects to see from a TLS 1.3
/// server are named; everything else is handled by numeric value.
///
/// # References
///
/// * [RFC 8446 Section 4.2](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2)
#[repr(u16)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    ServerName = 0,                           // RFC 6066
    SupportedGroups = 10,                     // RFC 8422, 7919
    SignatureAlgorithms = 13,                 // RFC 8446
    ApplicationLayerProtocolNegotiation = 16, // RFC 7301
    SupportedVersions = 43,                   // RFC 8446
    PskKeyExchangeModes = 45,                 // RFC 8446
    KeyShare = 51,                            // RFC 8446
}

impl From<ExtensionType> for u16 {
    #[inline]
    fn from(extension_type: ExtensionType) -> Self {
        extension_type as u16
    }
}

impl TryFrom<u16> for ExtensionType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ServerName),
            10 => Ok(Self::SupportedGroups),
            13 => Ok(Self::SignatureAlgorithms),
            16 => Ok(Self::ApplicationLayerProtocolNegotiation),
            43 => Ok(Self::SupportedVersions),
            45 => Ok(Self::PskKeyExchangeModes),
            51 => Ok(Self::KeyShare),
            _ => Err(value),
        }
    }
}
