//! Provides an implementation of the "ssh-ed25519" host key algorithm.

use definitions::algorithms::HostKeyAlgorithm;
use ed25519_dalek::{Signature, VerifyingKey};

/// The prefix used for a signature.
///
/// The encoding of the signature is:
///
/// ```text,no_run
/// string "ssh-ed25519"
/// string signature
/// ```
const SIGNATURE_PREFIX: &[u8] = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x40";

/// The prefix used for a public key.
///
/// The encoding of the public key is:
///
/// ```text,no_run
/// string "ssh-ed25519"
/// string public_key
/// ```
const PUBLIC_KEY_PREFIX: &[u8] = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x20";

/// Implements the "ssh-ed25519" host key algorithm.
///
/// The existence of this struct is controlled by the `ssh-ed25519` feature.
#[derive(Debug, Default, Clone)]
// This isn't a unit struct, to allow for future expansions of this.
#[non_exhaustive]
pub struct Ed25519 {}

impl Ed25519 {
    /// Creates a new "ssh-ed25519" host key algorithm.
    pub fn new() -> Ed25519 {
        Ed25519 {}
    }
}

impl HostKeyAlgorithm for Ed25519 {
    const NAME: &'static str = "ssh-ed25519";
    const IS_SIGNATURE_CAPABLE: bool = true;
    const IS_ENCRYPTION_CAPABLE: bool = false;

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        if !signature.starts_with(SIGNATURE_PREFIX) || !public_key.starts_with(PUBLIC_KEY_PREFIX) {
            return false;
        }

        let public_key: [u8; 32] = match public_key[PUBLIC_KEY_PREFIX.len()..].try_into() {
            Ok(key) => key,
            Err(_) => return false,
        };
        let public_key = match VerifyingKey::from_bytes(&public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };

        let signature: [u8; 64] = match signature[SIGNATURE_PREFIX.len()..].try_into() {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        let signature = Signature::from_bytes(&signature);

        use ed25519_dalek::Verifier as _;
        public_key.verify(message, &signature).is_ok()
    }
}
