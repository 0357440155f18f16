//! Provides the key exchange algorithms used by the SSH transport layer.

use definitions::algorithms::internal;

#[cfg(feature = "curve25519-sha256")]
#[doc(hidden)]
mod curve25519_sha256;
#[cfg(feature = "curve25519-sha256")]
#[doc(inline)]
pub use self::curve25519_sha256::*;

#[cfg(any(
    feature = "diffie-hellman-group-exchange-sha256",
    feature = "diffie-hellman-group14-sha256",
    feature = "diffie-hellman-group14-sha1",
    feature = "diffie-hellman-group1-sha1"
))]
#[doc(hidden)]
mod diffie_hellman;
#[cfg(any(
    feature = "diffie-hellman-group-exchange-sha256",
    feature = "diffie-hellman-group14-sha256",
    feature = "diffie-hellman-group14-sha1",
    feature = "diffie-hellman-group1-sha1"
))]
#[doc(inline)]
pub use self::diffie_hellman::*;

/// Calls the `add` function with all key exchange algorithms defined and enabled in this crate.
pub fn add_algorithms<F>(mut add: F)
where
    F: FnMut(internal::KeyExchangeAlgorithmEntry),
{
    // This is the same order used by OpenSSH
    #[cfg(feature = "curve25519-sha256")]
    add(Curve25519Sha256::new().into());
    #[cfg(feature = "curve25519-sha256")]
    add(Curve25519Sha256Libssh::new().into());
    #[cfg(feature = "diffie-hellman-group-exchange-sha256")]
    add(DhGroupExchangeSha256::new().into());
    #[cfg(feature = "diffie-hellman-group14-sha256")]
    add(DhGroup14Sha256::new().into());
    #[cfg(feature = "diffie-hellman-group14-sha1")]
    add(DhGroup14Sha1::new().into());
    #[cfg(feature = "diffie-hellman-group1-sha1")]
    add(DhGroup1Sha1::new().into());
}
