//! X25519 key exchange.
//!
//! # References
//!
//! * [RFC 7748](https://datatracker.ietf.org/doc/html/rfc7748)
//! * [RFC 8446 Section 7.4.2](https://datatracker.ietf.org/doc/html/rfc8446#section-7.4.2)

use crate::error::CryptoError;
use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

/// Length of an X25519 public key, private scalar, and shared secret.
pub(crate) const KEY_LEN: usize = 32;

/// Generate an ephemeral secret and the matching public key bytes.
pub(crate) fn keygen<R: RngCore + CryptoRng>(rng: &mut R) -> (EphemeralSecret, [u8; KEY_LEN]) {
    let secret: EphemeralSecret = EphemeralSecret::random_from_rng(&mut *rng);
    let public: PublicKey = PublicKey::from(&secret);
    (secret, public.to_bytes())
}

/// Complete the exchange, consuming the ephemeral secret.
///
/// RFC 7748 requires checking for the all-zero output that results from a
/// small-order peer point; such a "shared secret" would be known to anyone.
pub(crate) fn diffie_hellman(
    secret: EphemeralSecret,
    peer: &[u8; KEY_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let shared = secret.diffie_hellman(&PublicKey::from(*peer));
    if !shared.was_contributory() {
        return Err(CryptoError::KeyExchangeFailed);
    }
    Ok(Zeroizing::new(shared.to_bytes()))
}
