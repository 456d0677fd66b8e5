use crate::cipher_suites::CipherSuite;
use crate::error::ConfigError;
use crate::record::TlsVersion;
use log::warn;
use std::time::Duration;

/// Client configuration.
///
/// Options are copied at client construction; later mutation of the caller's
/// value has no effect on an existing client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// TCP connect timeout. Read and write timeouts after establishment are
    /// the caller's responsibility via the transport.
    pub timeout: Duration,
    /// Requested protocol version, `"1.3"` or `"1.2"`.
    ///
    /// Informational: `"1.2"` is accepted and reported back by
    /// [`Client::version`](crate::Client::version), but the handshake is
    /// always TLS 1.3. Anything else is a configuration error.
    pub version: String,
    /// Cipher suite preference list, by standard name, most preferred
    /// first. Unrecognised names are dropped; recognised defaults not in
    /// the list are appended.
    pub cipher_suites: Vec<String>,
    /// ALPN protocol identifiers to offer, most preferred first. An empty
    /// list disables ALPN.
    pub alpn: Vec<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            version: "1.3".to_string(),
            cipher_suites: CipherSuite::DEFAULTS
                .iter()
                .map(|suite| suite.name().to_string())
                .collect(),
            alpn: vec!["http/1.1".to_string()],
        }
    }
}

impl ClientOptions {
    /// Parse the configured version name.
    pub(crate) fn parsed_version(&self) -> Result<TlsVersion, ConfigError> {
        TlsVersion::from_name(&self.version)
            .ok_or_else(|| ConfigError::UnknownVersion(self.version.clone()))
    }

    /// Resolve the configured preference list into concrete suites:
    /// recognised names in preference order, deduplicated, with the
    /// remaining defaults appended.
    ///
    /// An explicit list in which nothing is recognised is a configuration
    /// error rather than a silent fallback to the defaults.
    pub(crate) fn normalized_cipher_suites(&self) -> Result<Vec<CipherSuite>, ConfigError> {
        let mut suites: Vec<CipherSuite> = Vec::with_capacity(CipherSuite::DEFAULTS.len());

        for name in &self.cipher_suites {
            match CipherSuite::from_name(name) {
                Some(suite) => {
                    if !suites.contains(&suite) {
                        suites.push(suite);
                    }
                }
                None => warn!("dropping unrecognised cipher suite {name:?}"),
            }
        }

        if !self.cipher_suites.is_empty() && suites.is_empty() {
            return Err(ConfigError::NoCipherSuites);
        }

        for suite in CipherSuite::DEFAULTS {
            if !suites.contains(&suite) {
                suites.push(suite);
            }
        }

        Ok(suites)
    }
}

#[cfg(test)]
mod tests {
    use super::ClientOptions;
    use crate::cipher_suites::CipherSuite;
    use crate::error::ConfigError;
    use crate::record::TlsVersion;

    #[test]
    fn defaults() {
        let options: ClientOptions = ClientOptions::default();
        assert_eq!(
            options.normalized_cipher_suites().unwrap(),
            CipherSuite::DEFAULTS.to_vec()
        );
        assert_eq!(options.parsed_version().unwrap(), TlsVersion::V1_3);
        assert_eq!(options.alpn, vec!["http/1.1".to_string()]);
        assert_eq!(options.timeout.as_secs(), 30);
    }

    #[test]
    fn version_names() {
        let options: ClientOptions = ClientOptions {
            version: "1.2".to_string(),
            ..ClientOptions::default()
        };
        assert_eq!(options.parsed_version().unwrap(), TlsVersion::V1_2);

        let options: ClientOptions = ClientOptions {
            version: "1.1".to_string(),
            ..ClientOptions::default()
        };
        assert_eq!(
            options.parsed_version().unwrap_err(),
            ConfigError::UnknownVersion("1.1".to_string())
        );
    }

    #[test]
    fn preference_order_and_dedup() {
        let options: ClientOptions = ClientOptions {
            cipher_suites: vec![
                "TLS_CHACHA20_POLY1305_SHA256".to_string(),
                "TLS_FAKE_SUITE".to_string(),
                "TLS_CHACHA20_POLY1305_SHA256".to_string(),
            ],
            ..ClientOptions::default()
        };

        assert_eq!(
            options.normalized_cipher_suites().unwrap(),
            vec![
                CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
                CipherSuite::TLS_AES_128_GCM_SHA256,
                CipherSuite::TLS_AES_256_GCM_SHA384,
            ]
        );
    }

    #[test]
    fn nothing_recognised_is_an_error() {
        let options: ClientOptions = ClientOptions {
            cipher_suites: vec!["TLS_RSA_WITH_RC4_128_MD5".to_string()],
            ..ClientOptions::default()
        };
        assert_eq!(
            options.normalized_cipher_suites().unwrap_err(),
            ConfigError::NoCipherSuites
        );
    }

    #[test]
    fn empty_list_uses_defaults() {
        let options: ClientOptions = ClientOptions {
            cipher_suites: vec![],
            ..ClientOptions::default()
        };
        assert_eq!(
            options.normalized_cipher_suites().unwrap(),
            CipherSuite::DEFAULTS.to_vec()
        );
    }
}
