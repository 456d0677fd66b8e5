//! TLS 1.3 key schedule.
//!
//! # References
//!
//! * [RFC 5869] HMAC-based Extract-and-Expand Key Derivation Function (HKDF)
//! * [RFC 8446 Section 7.1](https://datatracker.ietf.org/doc/html/rfc8446#section-7.1)
//!
//! [RFC 5869]: https://datatracker.ietf.org/doc/html/rfc5869

use crate::cipher_suites::CipherSuite;
use crate::crypto::x25519;
use crate::error::CryptoError;
use crate::record::CipherState;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256, Sha384};
use subtle::ConstantTimeEq;
use x25519_dalek::EphemeralSecret;
use zeroize::Zeroizing;

/// Transcript hash negotiated with the cipher suite.
///
/// TLS_AES_256_GCM_SHA384 selects SHA-384; the other suites select SHA-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
}

impl HashAlgorithm {
    /// Digest output length in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
        }
    }

    /// Hash the concatenation of `parts`.
    pub(crate) fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            Self::Sha256 => {
                let mut hasher: Sha256 = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            Self::Sha384 => {
                let mut hasher: Sha384 = Sha384::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
        }
    }

    /// `HKDF-Extract(salt, ikm)`.
    pub(crate) fn extract(self, salt: &[u8], ikm: &[u8]) -> Zeroizing<Vec<u8>> {
        match self {
            Self::Sha256 => {
                let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
                Zeroizing::new(prk.to_vec())
            }
            Self::Sha384 => {
                let (prk, _) = Hkdf::<Sha384>::extract(Some(salt), ikm);
                Zeroizing::new(prk.to_vec())
            }
        }
    }

    /// TLS 1.3 `HKDF-Expand-Label`.
    ///
    /// ```text
    /// HKDF-Expand-Label(Secret, Label, Context, Length) =
    ///     HKDF-Expand(Secret, HkdfLabel, Length)
    /// ```
    pub(crate) fn expand_label(
        self,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Zeroizing<Vec<u8>> {
        let info: Vec<u8> = hkdf_label(len as u16, label, context);
        let mut okm: Zeroizing<Vec<u8>> = Zeroizing::new(vec![0; len]);
        // secret is always a PRK of at least the digest length, and len is
        // bounded by 255 * digest length; expand cannot fail
        match self {
            Self::Sha256 => Hkdf::<Sha256>::from_prk(secret)
                .unwrap()
                .expand(&info, &mut okm)
                .unwrap(),
            Self::Sha384 => Hkdf::<Sha384>::from_prk(secret)
                .unwrap()
                .expand(&info, &mut okm)
                .unwrap(),
        }
        okm
    }

    /// `HMAC-H(key, data)`.
    pub(crate) fn hmac(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => {
                // HMAC accepts keys of any length
                let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha384 => {
                let mut mac = Hmac::<Sha384>::new_from_slice(key).unwrap();
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}

/// Encode a TLS HKDF label.
///
/// # References
///
/// * [RFC 8446 Section 7.1](https://datatracker.ietf.org/doc/html/rfc8446#section-7.1)
///
/// ```text
/// struct {
///     uint16 length = Length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
fn hkdf_label(len: u16, label: &[u8], context: &[u8]) -> Vec<u8> {
    const LABEL_PREFIX: &[u8] = b"tls13 ";

    let mut hkdf_label: Vec<u8> =
        Vec::with_capacity(4 + LABEL_PREFIX.len() + label.len() + context.len());
    hkdf_label.extend_from_slice(&len.to_be_bytes());
    hkdf_label.push((LABEL_PREFIX.len() + label.len()) as u8);
    hkdf_label.extend_from_slice(LABEL_PREFIX);
    hkdf_label.extend_from_slice(label);
    hkdf_label.push(context.len() as u8);
    hkdf_label.extend_from_slice(context);
    hkdf_label
}

/// TLS 1.3 `Derive-Secret`.
///
/// ```text
/// Derive-Secret(Secret, Label, Messages) =
///     HKDF-Expand-Label(Secret, Label,
///                       Transcript-Hash(Messages), Hash.length)
/// ```
fn derive_secret(
    alg: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    messages: &[u8],
) -> Zeroizing<Vec<u8>> {
    let transcript_hash: Vec<u8> = alg.digest(&[messages]);
    alg.expand_label(secret, label, &transcript_hash, alg.output_len())
}

/// Key schedule state for one connection.
///
/// Owns every secret from the ephemeral X25519 scalar through the
/// application traffic secrets. Secrets are derived exactly once each, in
/// order; invoking a step before its prerequisites yields
/// [`CryptoError::KeyScheduleNotReady`]. All key material is wiped on drop
/// and on [`reset`](Self::reset).
pub(crate) struct KeySchedule {
    suite: Option<CipherSuite>,
    client_secret: Option<EphemeralSecret>,
    server_public: Option<[u8; 32]>,
    shared_secret: Option<Zeroizing<[u8; 32]>>,
    early_secret: Option<Zeroizing<Vec<u8>>>,
    handshake_secret: Option<Zeroizing<Vec<u8>>>,
    client_hs_secret: Option<Zeroizing<Vec<u8>>>,
    server_hs_secret: Option<Zeroizing<Vec<u8>>>,
    client_ap_secret: Option<Zeroizing<Vec<u8>>>,
    server_ap_secret: Option<Zeroizing<Vec<u8>>>,
}

impl Default for KeySchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySchedule {
    pub fn new() -> Self {
        Self {
            suite: None,
            client_secret: None,
            server_public: None,
            shared_secret: None,
            early_secret: None,
            handshake_secret: None,
            client_hs_secret: None,
            server_hs_secret: None,
            client_ap_secret: None,
            server_ap_secret: None,
        }
    }

    /// Discard all key material.
    pub fn reset(&mut self) {
        // Zeroizing wipes each secret as it is dropped
        *self = Self::new();
    }

    /// Generate the ephemeral X25519 keypair and return the public key.
    ///
    /// Called exactly once per connection, before the ClientHello is built.
    pub fn generate_keypair<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> [u8; 32] {
        debug_assert!(self.client_secret.is_none());
        let (secret, public) = x25519::keygen(rng);
        self.client_secret.replace(secret);
        public
    }

    /// Select the cipher suite, fixing the hash algorithm for the rest of
    /// the connection.
    pub fn set_suite(&mut self, suite: CipherSuite) {
        debug_assert!(self.suite.is_none());
        self.suite.replace(suite);
    }

    pub fn suite(&self) -> Option<CipherSuite> {
        self.suite
    }

    fn alg(&self) -> Result<HashAlgorithm, CryptoError> {
        Ok(self
            .suite
            .ok_or(CryptoError::KeyScheduleNotReady("cipher suite"))?
            .hash_algorithm())
    }

    /// Set the server's X25519 public key from the ServerHello key share.
    pub fn set_server_public_key(&mut self, key: [u8; 32]) {
        debug_assert!(self.server_public.is_none());
        self.server_public.replace(key);
    }

    /// Complete the ECDHE exchange, consuming the ephemeral scalar.
    pub fn compute_shared_secret(&mut self) -> Result<(), CryptoError> {
        let secret: EphemeralSecret = self
            .client_secret
            .take()
            .ok_or(CryptoError::KeyScheduleNotReady("client keypair"))?;
        let peer: &[u8; 32] = self
            .server_public
            .as_ref()
            .ok_or(CryptoError::KeyScheduleNotReady("server public key"))?;
        self.shared_secret.replace(x25519::diffie_hellman(secret, peer)?);
        Ok(())
    }

    /// ```text
    /// Early Secret = HKDF-Extract(salt: 0, ikm: 0)
    /// ```
    ///
    /// External PSKs are not supported, so the input key material is always
    /// a string of zeros of the digest length.
    pub fn derive_early(&mut self) -> Result<(), CryptoError> {
        let alg: HashAlgorithm = self.alg()?;
        debug_assert!(self.early_secret.is_none());

        let zeros: Zeroizing<Vec<u8>> = Zeroizing::new(vec![0; alg.output_len()]);
        self.early_secret.replace(alg.extract(&zeros, &zeros));
        Ok(())
    }

    /// ```text
    /// Handshake Secret =
    ///     HKDF-Extract(salt: Derive-Secret(Early Secret, "derived", ""),
    ///                  ikm: ECDHE shared secret)
    /// ```
    pub fn derive_handshake(&mut self) -> Result<(), CryptoError> {
        let alg: HashAlgorithm = self.alg()?;
        let early: &[u8] = self
            .early_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("early secret"))?;
        let shared: &[u8; 32] = self
            .shared_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("ECDHE shared secret"))?;
        debug_assert!(self.handshake_secret.is_none());

        let salt: Zeroizing<Vec<u8>> = derive_secret(alg, early, b"derived", b"");
        self.handshake_secret.replace(alg.extract(&salt, shared));
        Ok(())
    }

    /// Derive the handshake traffic secrets over the transcript through the
    /// ServerHello.
    ///
    /// ```text
    /// client_handshake_traffic_secret =
    ///     Derive-Secret(Handshake Secret, "c hs traffic", ClientHello...ServerHello)
    /// server_handshake_traffic_secret =
    ///     Derive-Secret(Handshake Secret, "s hs traffic", ClientHello...ServerHello)
    /// ```
    pub fn derive_handshake_traffic(&mut self, transcript: &[u8]) -> Result<(), CryptoError> {
        let alg: HashAlgorithm = self.alg()?;
        let handshake: &[u8] = self
            .handshake_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("handshake secret"))?;
        debug_assert!(self.client_hs_secret.is_none());

        self.client_hs_secret
            .replace(derive_secret(alg, handshake, b"c hs traffic", transcript));
        self.server_hs_secret
            .replace(derive_secret(alg, handshake, b"s hs traffic", transcript));
        Ok(())
    }

    /// Derive the application traffic secrets over the transcript through
    /// the client Finished.
    ///
    /// ```text
    /// Master Secret =
    ///     HKDF-Extract(salt: Derive-Secret(Handshake Secret, "derived", ""),
    ///                  ikm: 0)
    /// ```
    pub fn derive_application(&mut self, transcript: &[u8]) -> Result<(), CryptoError> {
        let alg: HashAlgorithm = self.alg()?;
        let handshake: &[u8] = self
            .handshake_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("handshake secret"))?;
        if self.client_hs_secret.is_none() {
            return Err(CryptoError::KeyScheduleNotReady(
                "handshake traffic secrets",
            ));
        }
        debug_assert!(self.client_ap_secret.is_none());

        let salt: Zeroizing<Vec<u8>> = derive_secret(alg, handshake, b"derived", b"");
        let zeros: Zeroizing<Vec<u8>> = Zeroizing::new(vec![0; alg.output_len()]);
        let master: Zeroizing<Vec<u8>> = alg.extract(&salt, &zeros);

        self.client_ap_secret
            .replace(derive_secret(alg, &master, b"c ap traffic", transcript));
        self.server_ap_secret
            .replace(derive_secret(alg, &master, b"s ap traffic", transcript));
        Ok(())
    }

    /// Expand a traffic secret into a record cipher state.
    ///
    /// ```text
    /// [sender]_write_key = HKDF-Expand-Label(Secret, "key", "", key_length)
    /// [sender]_write_iv  = HKDF-Expand-Label(Secret, "iv", "", iv_length)
    /// ```
    ///
    /// # References
    ///
    /// * [RFC 8446 Section 7.3](https://datatracker.ietf.org/doc/html/rfc8446#section-7.3)
    fn traffic_state(&self, secret: &[u8]) -> Result<CipherState, CryptoError> {
        let suite: CipherSuite = self
            .suite
            .ok_or(CryptoError::KeyScheduleNotReady("cipher suite"))?;
        let alg: HashAlgorithm = suite.hash_algorithm();

        let key: Zeroizing<Vec<u8>> = alg.expand_label(secret, b"key", &[], suite.key_len());
        let iv: Zeroizing<Vec<u8>> = alg.expand_label(secret, b"iv", &[], crate::record::IV_LEN);
        let mut iv_bytes: [u8; crate::record::IV_LEN] = [0; crate::record::IV_LEN];
        iv_bytes.copy_from_slice(&iv);

        Ok(CipherState::new(suite, key, iv_bytes))
    }

    /// Cipher states for the handshake epoch, as `(write, read)`, i.e.
    /// `(client, server)`.
    pub fn handshake_cipher_states(&self) -> Result<(CipherState, CipherState), CryptoError> {
        let client: &[u8] = self
            .client_hs_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("handshake traffic secrets"))?;
        let server: &[u8] = self
            .server_hs_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("handshake traffic secrets"))?;
        Ok((self.traffic_state(client)?, self.traffic_state(server)?))
    }

    /// Cipher states for the application epoch, as `(write, read)`.
    pub fn application_cipher_states(&self) -> Result<(CipherState, CipherState), CryptoError> {
        let client: &[u8] = self
            .client_ap_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("application traffic secrets"))?;
        let server: &[u8] = self
            .server_ap_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("application traffic secrets"))?;
        Ok((self.traffic_state(client)?, self.traffic_state(server)?))
    }

    /// Verify the server Finished.
    ///
    /// ```text
    /// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
    /// verify_data  = HMAC(finished_key, Transcript-Hash(...))
    /// ```
    ///
    /// Some peers compute the MAC over the transcript that already includes
    /// the Finished frame itself, so both boundaries are checked; the
    /// comparison is constant-time over both candidates.
    ///
    /// # References
    ///
    /// * [RFC 8446 Section 4.4.4](https://datatracker.ietf.org/doc/html/rfc8446#section-4.4.4)
    pub fn verify_server_finished(
        &self,
        verify_data: &[u8],
        transcript: &[u8],
        finished_frame: &[u8],
    ) -> Result<(), CryptoError> {
        let alg: HashAlgorithm = self.alg()?;
        let secret: &[u8] = self
            .server_hs_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("handshake traffic secrets"))?;

        let finished_key: Zeroizing<Vec<u8>> =
            alg.expand_label(secret, b"finished", &[], alg.output_len());
        let excluding: Vec<u8> = alg.hmac(&finished_key, &alg.digest(&[transcript]));
        let including: Vec<u8> =
            alg.hmac(&finished_key, &alg.digest(&[transcript, finished_frame]));

        let ok = excluding.ct_eq(verify_data) | including.ct_eq(verify_data);
        if bool::from(ok) {
            Ok(())
        } else {
            Err(CryptoError::FinishedVerifyFailed)
        }
    }

    /// Compute the client Finished verify_data over the transcript through
    /// the server Finished.
    pub fn client_finished_verify_data(&self, transcript: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let alg: HashAlgorithm = self.alg()?;
        let secret: &[u8] = self
            .client_hs_secret
            .as_deref()
            .ok_or(CryptoError::KeyScheduleNotReady("handshake traffic secrets"))?;

        let finished_key: Zeroizing<Vec<u8>> =
            alg.expand_label(secret, b"finished", &[], alg.output_len());
        Ok(alg.hmac(&finished_key, &alg.digest(&[transcript])))
    }
}

impl core::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        write!(f, "KeySchedule {{ ... }}")
    }
}
