//! Hybrid RSA-OAEP / AES-256-GCM envelope used for each sealed value.
//!
//! Layout of one ciphertext:
//!
//! ```text
//! +----------------+------------------------------+-------------------------------+
//! | u16 BE length  | RSA-OAEP(SHA-256) session key | AES-256-GCM(plaintext) || tag |
//! +----------------+------------------------------+-------------------------------+
//! ```
//!
//! The session key is random and used for exactly one value, so the GCM nonce is
//! all zeroes. The OAEP label binds the ciphertext to its scope.

use rand::{CryptoRng, RngCore};
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::error;
use zeroize::Zeroizing;

use super::error::SealError;

const SESSION_KEY_BYTES: usize = 32;
const LENGTH_PREFIX_BYTES: usize = 2;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Hands out the all-zero nonce exactly once.
struct ZeroNonce {
    used: bool,
}

impl ZeroNonce {
    fn new() -> Self {
        Self { used: false }
    }
}

impl NonceSequence for ZeroNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        if std::mem::replace(&mut self.used, true) {
            return Err(ring::error::Unspecified);
        }
        Ok(Nonce::assume_unique_for_key([0u8; NONCE_SIZE]))
    }
}

/// Encrypt `plaintext` for the holder of the private half of `key`.
///
/// # Errors
///
/// Returns [`SealError::Encryption`] if the key is too small for OAEP with
/// SHA-256 or the cipher fails.
pub fn hybrid_encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &RsaPublicKey,
    plaintext: &[u8],
    label: &str,
) -> Result<Vec<u8>, SealError> {
    let mut session_key = Zeroizing::new([0u8; SESSION_KEY_BYTES]);
    rng.fill_bytes(&mut session_key[..]);

    let unbound_key = UnboundKey::new(&AES_256_GCM, &session_key[..]).map_err(|_| {
        error!("Failed to create session key");
        SealError::encryption("invalid session key length")
    })?;
    let mut sealing_key = aead::SealingKey::new(unbound_key, ZeroNonce::new());

    let wrapped_key = key
        .encrypt(rng, Oaep::new_with_label::<Sha256, _>(label), &session_key[..])
        .map_err(|e| SealError::encryption(format!("RSA-OAEP encryption failed: {}", e)))?;
    let wrapped_len = u16::try_from(wrapped_key.len())
        .map_err(|_| SealError::encryption("RSA ciphertext exceeds 65535 bytes"))?;

    let mut sealed = plaintext.to_vec();
    sealed.reserve(TAG_SIZE);
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut sealed)
        .map_err(|_| SealError::encryption("AES-GCM encryption failed"))?;

    let mut ciphertext = Vec::with_capacity(LENGTH_PREFIX_BYTES + wrapped_key.len() + sealed.len());
    ciphertext.extend_from_slice(&wrapped_len.to_be_bytes());
    ciphertext.extend_from_slice(&wrapped_key);
    ciphertext.extend_from_slice(&sealed);
    Ok(ciphertext)
}

/// Reverse of [`hybrid_encrypt`], for holders of the private key.
///
/// # Errors
///
/// Returns [`SealError::Decryption`] on truncated input, a wrong key or label,
/// or a failed authentication tag.
pub fn hybrid_decrypt(
    key: &RsaPrivateKey,
    ciphertext: &[u8],
    label: &str,
) -> Result<Vec<u8>, SealError> {
    if ciphertext.len() < LENGTH_PREFIX_BYTES {
        return Err(SealError::decryption("ciphertext too short"));
    }
    let wrapped_len = u16::from_be_bytes([ciphertext[0], ciphertext[1]]) as usize;
    let body = &ciphertext[LENGTH_PREFIX_BYTES..];
    if body.len() < wrapped_len + TAG_SIZE {
        return Err(SealError::decryption("ciphertext truncated"));
    }
    let (wrapped_key, sealed) = body.split_at(wrapped_len);

    let session_key = Zeroizing::new(
        key.decrypt(Oaep::new_with_label::<Sha256, _>(label), wrapped_key)
            .map_err(|e| SealError::decryption(format!("RSA-OAEP decryption failed: {}", e)))?,
    );

    let unbound_key = UnboundKey::new(&AES_256_GCM, &session_key[..])
        .map_err(|_| SealError::decryption("invalid session key length"))?;
    let mut opening_key = aead::OpeningKey::new(unbound_key, ZeroNonce::new());

    let mut buffer = sealed.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut buffer)
        .map_err(|_| SealError::decryption("authentication tag mismatch"))?;
    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::traits::PublicKeyParts;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut OsRng, 1024).unwrap()
    }

    #[test]
    fn test_layout_and_decrypt() {
        let private = test_key();
        let public = private.to_public_key();

        let ciphertext = hybrid_encrypt(&mut OsRng, &public, b"valueAA", "ns/name").unwrap();

        let wrapped_len = u16::from_be_bytes([ciphertext[0], ciphertext[1]]) as usize;
        assert_eq!(wrapped_len, public.size());
        // prefix + wrapped key + plaintext + 16-byte tag
        assert_eq!(ciphertext.len(), 2 + public.size() + 7 + 16);

        let plaintext = hybrid_decrypt(&private, &ciphertext, "ns/name").unwrap();
        assert_eq!(plaintext, b"valueAA");
    }

    #[test]
    fn test_label_binds_ciphertext() {
        let private = test_key();
        let ciphertext =
            hybrid_encrypt(&mut OsRng, &private.to_public_key(), b"value", "ns/name").unwrap();

        let err = hybrid_decrypt(&private, &ciphertext, "other-ns/name").unwrap_err();
        assert!(matches!(err, SealError::Decryption { .. }));
    }

    #[test]
    fn test_each_encryption_uses_fresh_session_key() {
        let public = test_key().to_public_key();
        let a = hybrid_encrypt(&mut OsRng, &public, b"value", "").unwrap();
        let b = hybrid_encrypt(&mut OsRng, &public, b"value", "").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_nonce_is_single_use() {
        let mut nonces = ZeroNonce::new();
        assert!(nonces.advance().is_ok());
        assert!(nonces.advance().is_err());
    }

    #[test]
    fn test_truncated_ciphertext() {
        let private = test_key();
        assert!(hybrid_decrypt(&private, &[0x01], "").is_err());
        assert!(hybrid_decrypt(&private, &[0x00, 0x80, 0x01, 0x02], "").is_err());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let private = test_key();
        let mut ciphertext =
            hybrid_encrypt(&mut OsRng, &private.to_public_key(), b"value", "").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xff;

        let err = hybrid_decrypt(&private, &ciphertext, "").unwrap_err();
        assert_eq!(err, SealError::decryption("authentication tag mismatch"));
    }
}
