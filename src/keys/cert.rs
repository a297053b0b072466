//! Certificate parsing and public key extraction.

use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use sha2::{Digest, Sha256};
use x509_parser::pem::Pem;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use super::error::ResolveError;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Largest accepted RSA modulus. Controllers may run with keys well above 4096 bits.
pub const MAX_MODULUS_BITS: usize = 16384;

/// Parse one or more PEM certificates and return the RSA key of the first one.
///
/// Blocks with a label other than `CERTIFICATE` are skipped. Every certificate
/// block must parse, even though only the first key is used.
///
/// # Errors
///
/// - [`ResolveError::Pem`] if the PEM framing or base64 is malformed
/// - [`ResolveError::NoCertificates`] if no certificate block is present
/// - [`ResolveError::Certificate`] if a block is not valid X.509
/// - [`ResolveError::UnsupportedKeyType`] if the first key is not RSA
pub fn public_key_from_pem_bytes(data: &[u8]) -> Result<RsaPublicKey, ResolveError> {
    let blocks = certificate_blocks(data)?;

    let mut first_key = None;
    for block in &blocks {
        let cert = block
            .parse_x509()
            .map_err(|e| ResolveError::certificate(format!("failed to parse X.509: {}", e)))?;
        if first_key.is_none() {
            first_key = Some(rsa_public_key(cert.public_key()));
        }
    }

    first_key.unwrap_or(Err(ResolveError::NoCertificates))
}

/// Same as [`public_key_from_pem_bytes`] for PEM text, e.g. a certificate
/// supplied directly by the user instead of fetched from the controller.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey, ResolveError> {
    public_key_from_pem_bytes(pem.as_bytes())
}

/// Hex SHA-256 over the big-endian modulus followed by the big-endian exponent.
///
/// Stable for a given key; used to detect that the controller key changed.
pub fn fingerprint(key: &RsaPublicKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.n().to_bytes_be());
    hasher.update(key.e().to_bytes_be());
    hex::encode(hasher.finalize())
}

fn certificate_blocks(data: &[u8]) -> Result<Vec<Pem>, ResolveError> {
    let mut blocks = Vec::new();
    for pem in Pem::iter_from_buffer(data) {
        let pem = pem.map_err(|e| ResolveError::pem(e.to_string()))?;
        if pem.label == CERTIFICATE_LABEL {
            blocks.push(pem);
        }
    }
    Ok(blocks)
}

fn rsa_public_key(spki: &SubjectPublicKeyInfo<'_>) -> Result<RsaPublicKey, ResolveError> {
    match spki.parsed() {
        Ok(PublicKey::RSA(key)) => rsa_key_from_parts(key.modulus, key.exponent),
        Ok(_) => Err(ResolveError::unsupported_key_type(spki.algorithm.algorithm.to_id_string())),
        Err(e) => Err(ResolveError::certificate(format!("failed to parse public key: {}", e))),
    }
}

fn rsa_key_from_parts(modulus: &[u8], exponent: &[u8]) -> Result<RsaPublicKey, ResolveError> {
    let n = BigUint::from_bytes_be(modulus);
    let e = BigUint::from_bytes_be(exponent);
    RsaPublicKey::new_with_max_size(n, e, MAX_MODULUS_BITS)
        .map_err(|e| ResolveError::certificate(format!("invalid RSA public key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER_CERT: &str = include_str!("../../tests/fixtures/controller-cert.pem");

    #[test]
    fn test_public_key_from_controller_cert() {
        let key = public_key_from_pem(CONTROLLER_CERT).unwrap();
        assert_eq!(key.e(), &BigUint::from(65537u32));
        assert_eq!(key.size(), 512);
    }

    #[test]
    fn test_first_certificate_wins() {
        let ec = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let bundle = format!("{}\n{}", CONTROLLER_CERT, ec.cert.pem());

        let key = public_key_from_pem(&bundle).unwrap();
        assert_eq!(key.e(), &BigUint::from(65537u32));
    }

    #[test]
    fn test_non_certificate_blocks_are_skipped() {
        let bundle = format!(
            "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n{}",
            CONTROLLER_CERT
        );
        assert!(public_key_from_pem(&bundle).is_ok());
    }

    #[test]
    fn test_no_certificates() {
        assert_eq!(public_key_from_pem("").unwrap_err(), ResolveError::NoCertificates);
        assert_eq!(
            public_key_from_pem("this is not pem").unwrap_err(),
            ResolveError::NoCertificates
        );
    }

    #[test]
    fn test_garbage_certificate() {
        let pem = "-----BEGIN CERTIFICATE-----\nZ2FyYmFnZQ==\n-----END CERTIFICATE-----\n";
        let err = public_key_from_pem(pem).unwrap_err();
        assert!(matches!(err, ResolveError::Certificate { .. }), "got {:?}", err);
    }

    #[test]
    fn test_ecdsa_key_is_rejected() {
        let ec = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let err = public_key_from_pem(&ec.cert.pem()).unwrap_err();
        assert_eq!(err, ResolveError::unsupported_key_type("1.2.840.10045.2.1"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_moduli_above_4096_bits_are_accepted() {
        // 8192-bit odd modulus; the key is only used for its size here.
        let modulus = vec![0xff; 1024];
        let key = rsa_key_from_parts(&modulus, &[0x01, 0x00, 0x01]).unwrap();
        assert_eq!(key.size() * 8, 8192);
    }

    #[test]
    fn test_moduli_above_limit_are_rejected() {
        let modulus = vec![0xff; MAX_MODULUS_BITS / 8 + 1];
        let err = rsa_key_from_parts(&modulus, &[0x01, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, ResolveError::Certificate { .. }), "got {:?}", err);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = public_key_from_pem(CONTROLLER_CERT).unwrap();
        let b = public_key_from_pem(CONTROLLER_CERT).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);

        let other = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap().to_public_key();
        assert_ne!(fingerprint(&a), fingerprint(&other));
    }
}
