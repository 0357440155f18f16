//! Defines the `HostKeyAlgorithm` trait.
//!
//! As this library only implements the client side of the protocol, host key algorithms
//! are used purely for verifying the signature a server presents over the exchange hash.
//! Whether the presented key should be trusted at all is a separate question, answered by
//! the host key verifier collaborator of the transport layer.

use std::{
    fmt,
    ops::{Deref, DerefMut},
};

/// Describes a host key algorithm.
pub trait HostKeyAlgorithm {
    /// The name of the host key algorithm.
    const NAME: &'static str;

    /// Whether the algorithm is capable of producing and verifying signatures.
    const IS_SIGNATURE_CAPABLE: bool;

    /// Whether the algorithm is capable of encryption and decryption.
    const IS_ENCRYPTION_CAPABLE: bool;

    /// Verifies that `signature` is a valid signature of `message` by `public_key`.
    ///
    /// Both `signature` and `public_key` are in their SSH wire encodings, including the
    /// algorithm name prefixes.
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// A runtime description of a host key algorithm.
///
/// This allows representing different host key algorithms with the same type.
///
/// It is mostly intended for internal use.
pub struct HostKeyAlgorithmEntry {
    /// The name of the host key algorithm.
    pub name: &'static str,
    /// Whether the algorithm is capable of producing and verifying signatures.
    pub is_signature_capable: bool,
    /// Whether the algorithm is capable of encryption and decryption.
    pub is_encryption_capable: bool,
    /// The algorithm itself.
    #[doc(hidden)]
    algorithm: Box<dyn DynHostKeyAlgorithm>,
}

impl fmt::Debug for HostKeyAlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HostKeyAlgorithmEntry")
            .field("name", &self.name)
            .field("is_signature_capable", &self.is_signature_capable)
            .field("is_encryption_capable", &self.is_encryption_capable)
            .finish_non_exhaustive()
    }
}

impl<T> From<T> for HostKeyAlgorithmEntry
where
    T: HostKeyAlgorithm + 'static,
{
    fn from(alg: T) -> Self {
        HostKeyAlgorithmEntry {
            name: <T as HostKeyAlgorithm>::NAME,
            is_signature_capable: <T as HostKeyAlgorithm>::IS_SIGNATURE_CAPABLE,
            is_encryption_capable: <T as HostKeyAlgorithm>::IS_ENCRYPTION_CAPABLE,
            algorithm: Box::new(alg),
        }
    }
}

impl Deref for HostKeyAlgorithmEntry {
    type Target = dyn DynHostKeyAlgorithm;

    fn deref(&self) -> &Self::Target {
        &*self.algorithm
    }
}

impl DerefMut for HostKeyAlgorithmEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.algorithm
    }
}

/// A trait object friendly version of the [`HostKeyAlgorithm`] trait.
///
/// **DO NOT IMPLEMENT THIS TRAIT MANUALLY.**
/// Implement the [`HostKeyAlgorithm`] trait instead.
///
/// This trait is mainly intended for internal use and automatically implemented for all
/// types implementing the [`HostKeyAlgorithm`] trait.
pub trait DynHostKeyAlgorithm {
    /// See [`HostKeyAlgorithm::verify`].
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

impl<T> DynHostKeyAlgorithm for T
where
    T: HostKeyAlgorithm,
{
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        <Self as HostKeyAlgorithm>::verify(self, message, signature, public_key)
    }
}
